//! Irrigation controller core.
//!
//! Computes evapotranspiration-based watering durations from daily weather
//! observations and serializes zone runs against the single physical water
//! line through a bounded FIFO scheduler.
//!
//! Layering, outermost first:
//!
//! * [`adapters`]: valve drivers, config/weather files, log sink
//! * [`app`]: ports, commands/events, and the [`app::ControllerService`]
//! * domain: [`config`], [`engine`], [`scheduler`], [`history`],
//!   [`recorder`]
//!
//! The domain modules never touch hardware or the filesystem; everything
//! external arrives through the port traits in [`app::ports`].

pub mod adapters;
pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod recorder;
pub mod scheduler;

pub use error::{Error, Result};
