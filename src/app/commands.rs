//! Commands accepted by the controller service.
//!
//! Every externally triggerable action is one variant, so the daemon's
//! command channel (CLI, web handler, test harness) speaks a single type.

use crate::config::Configuration;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    /// Run one zone for an explicit number of minutes, bypassing the ET
    /// engine. Works for disabled zones too; only requires the zone to
    /// exist in the configuration.
    RunZone { zone: usize, minutes: f64 },
    /// Stop the currently running zone. `destroy` skips promotion of the
    /// next queued run ("stop everything").
    StopRunning { destroy: bool },
    /// Remove a queued run by its 0-based wait-queue position.
    CancelQueued { index: usize },
    /// Swap in a freshly validated configuration. Running and queued runs
    /// are unaffected.
    UpdateConfig(Configuration),
    /// Reset the hardware alarm counter.
    ClearAlarms,
}
