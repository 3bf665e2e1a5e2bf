pub mod cache;
pub mod filter;
pub mod pagination;
pub mod request;
pub mod tour_cache;

pub use cache::*;
pub use filter::*;
pub use pagination::*;
pub use request::*;
pub use tour_cache::*;
