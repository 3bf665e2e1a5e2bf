pub mod bounds;
pub mod easing;
pub mod geo;

// Foundation crate: small, well-tested geographic primitives only.
pub use bounds::*;
pub use easing::*;
pub use geo::*;
