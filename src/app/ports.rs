//! Port traits: the boundary between the controller core and the outside
//! world.
//!
//! Driven adapters (valve hardware, weather feeds, config persistence,
//! event sinks) implement these traits. The domain core consumes them via
//! generics or trait objects injected at call sites, so the scheduler and
//! duration engine never touch hardware, the network, or the filesystem
//! directly and stay fully testable with mocks.

use chrono::NaiveDate;

use crate::config::Configuration;
use crate::error::ConfigError;
use crate::history::WeatherObservation;

// ───────────────────────────────────────────────────────────────
// Valve actuation port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Commands the physical valve box.
///
/// Calls are fire-and-forget from the scheduler's point of view: an
/// implementation must enforce its own command timeout and report a
/// non-acknowledging controller as `Err`, never by blocking the tick loop.
pub trait ValvePort {
    /// Open the valve for zone `zone`; watering is expected to last
    /// `minutes` (advisory; the scheduler closes the valve itself).
    fn activate_zone(&mut self, zone: usize, minutes: f64) -> Result<(), String>;

    /// Close the valve for zone `zone`.
    fn deactivate_zone(&mut self, zone: usize) -> Result<(), String>;

    /// Close every valve the controller knows about. Recovery sweep used
    /// at startup to override a physically stuck valve.
    fn close_all(&mut self) -> Result<(), String>;
}

// ───────────────────────────────────────────────────────────────
// Run recorder delegate (scheduler → history)
// ───────────────────────────────────────────────────────────────

/// Receives the actual outcome of every finished run.
///
/// Decouples the scheduler from the history store: the scheduler reports
/// "zone N watered for M minutes" and the recorder decides where that goes.
pub trait RunRecorder {
    /// Called exactly once per finished run, whether it expired naturally
    /// (`minutes` = requested) or was stopped early (`minutes` = elapsed).
    fn on_run_completed(&mut self, zone: usize, minutes: f64);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / UI)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`ControllerEvent`](super::events::ControllerEvent)s
/// through this port. Adapters decide where they go (log, status page, …).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::ControllerEvent);
}

/// Sink that drops every event; for callers that only want return values.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: &super::events::ControllerEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Weather source port (external data → domain)
// ───────────────────────────────────────────────────────────────

/// Delivers one observation per calendar date for the configured station.
/// No live API integration lives in the core; adapters push or are polled.
pub trait WeatherSource {
    fn observation_for(
        &mut self,
        station: &str,
        date: NaiveDate,
    ) -> Result<WeatherObservation, String>;
}

// ───────────────────────────────────────────────────────────────
// Configuration persistence port
// ───────────────────────────────────────────────────────────────

/// Loads and persists the configuration document. The scheduler and the
/// duration engine never touch this directly.
pub trait ConfigStore {
    fn load(&self) -> Result<Configuration, ConfigError>;
    fn save(&mut self, config: &Configuration) -> Result<(), ConfigError>;
}
