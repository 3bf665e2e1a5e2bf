//! Map exploration orchestrator: intro flight, idle rotation, tour overlay and
//! property paging over an external map engine.

pub mod config;
pub mod controller;
pub mod engine;
pub mod flight;
pub mod headless;
pub mod markers;
pub mod rotation;
pub mod tour;
pub mod viewport;

pub use config::{ConfigError, ExplorerConfig, RotationProfile};
pub use controller::*;
pub use engine::*;
pub use flight::{FlightEnd, FlightPhase, FlightPlan, FlightSource};
pub use tour::{OpenTrigger, TourState};

#[cfg(test)]
mod scenarios;
