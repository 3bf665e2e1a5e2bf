//! Listing-side data model and the external services the map explorer talks to.

pub mod demo;
pub mod filter;
pub mod http;
pub mod memory;
pub mod property;
pub mod region;
pub mod service;

pub use filter::*;
pub use property::*;
pub use region::*;
pub use service::*;
