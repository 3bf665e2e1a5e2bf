pub mod event_bus;
pub mod frame;
pub mod session;
pub mod timer;

pub use event_bus::*;
pub use frame::*;
pub use session::*;
pub use timer::*;
