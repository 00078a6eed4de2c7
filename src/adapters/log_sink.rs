//! Event sink that renders controller events as log lines.

use log::{info, warn};

use crate::app::events::ControllerEvent;
use crate::app::ports::EventSink;

#[derive(Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ControllerEvent) {
        match event {
            ControllerEvent::RunStarted { zone, minutes, source } => {
                info!("run started: zone {zone}, {minutes:.1} mins ({source:?})");
            }
            ControllerEvent::RunCompleted { zone, minutes } => {
                info!("run completed: zone {zone}, {minutes:.2} mins");
            }
            ControllerEvent::RunQueued { zone, minutes, position } => {
                info!("run queued: zone {zone}, {minutes:.1} mins at position {position}");
            }
            ControllerEvent::RunCancelled { zone } => {
                info!("queued run cancelled: zone {zone}");
            }
            ControllerEvent::QueueRejected { zone } => {
                warn!("run rejected, queue full: zone {zone}");
            }
            ControllerEvent::AlarmRaised { zone, detail } => {
                warn!("alarm: zone {zone}: {detail}");
            }
            ControllerEvent::ConfigUpdated => info!("configuration updated"),
        }
    }
}
