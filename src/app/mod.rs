//! Application layer: command/event surface, port traits, and the
//! controller service that orchestrates the domain modules.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;

pub use commands::ControllerCommand;
pub use events::{ControllerEvent, StatusSnapshot};
pub use service::ControllerService;
