//! Configuration hand-off for a household energy simulator.
//!
//! A presentation layer builds a [`model::ConfigDocument`], hands it to the
//! [`orchestrator::BridgeHandle`], and receives the simulator's parsed output
//! (or the reason there is none) as [`model::Notification`]s.

pub mod engine;
pub mod error;
pub mod identifier;
pub mod model;
pub mod orchestrator;

pub use error::{BridgeError, Result};
pub use identifier::HouseId;
pub use orchestrator::{Bridge, BridgeHandle, HostEvent, Session};
