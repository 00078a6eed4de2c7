//! Events emitted by the controller service.
//!
//! One event per externally observable state change, pushed through the
//! [`EventSink`](super::ports::EventSink) port. Adapters turn them into log
//! lines or status-page updates; the core never formats output itself.

use crate::scheduler::RunSource;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// A zone's valve opened and its countdown started.
    RunStarted { zone: usize, minutes: f64, source: RunSource },
    /// A run finished, naturally or by stop. `minutes` is what was
    /// recorded: requested on expiry, elapsed on stop.
    RunCompleted { zone: usize, minutes: f64 },
    /// A run was accepted but the line was busy; `position` is 1-based.
    RunQueued { zone: usize, minutes: f64, position: usize },
    /// A queued run was removed before it ran.
    RunCancelled { zone: usize },
    /// A submission was rejected because every wait slot was taken.
    QueueRejected { zone: usize },
    /// A valve command failed; the alarm counter was incremented.
    AlarmRaised { zone: usize, detail: String },
    /// A new configuration document took effect.
    ConfigUpdated,
}

/// Point-in-time controller state for status queries.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub running_zone: Option<usize>,
    pub remaining_secs: u32,
    pub queued_zones: Vec<usize>,
    pub alarm_count: u32,
}
