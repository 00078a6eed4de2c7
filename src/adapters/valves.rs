//! Valve actuation adapters.
//!
//! The production path shells out to per-command driver executables
//! (`zone_on`, `zone_off`, `zone_all_off`) living in a configurable
//! directory, so the same controller binary drives relay boards, X10
//! bridges, or anything else a small script can talk to. Each command is
//! retried a bounded number of times before the failure is surfaced.

use std::path::PathBuf;
use std::process::Command;

use log::{debug, info, warn};

use crate::app::ports::ValvePort;

const MAX_ATTEMPTS: u32 = 3;

/// [`ValvePort`] backed by external driver executables.
pub struct ShellValveController {
    driver_dir: PathBuf,
}

impl ShellValveController {
    pub fn new(driver_dir: impl Into<PathBuf>) -> Self {
        Self { driver_dir: driver_dir.into() }
    }

    /// Run one driver with bounded retries. Success is exit status 0.
    fn run_driver(&self, name: &str, arg: Option<usize>) -> Result<(), String> {
        let path = self.driver_dir.join(name);
        let mut last_err = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let mut cmd = Command::new(&path);
            if let Some(zone) = arg {
                cmd.arg(zone.to_string());
            }
            match cmd.output() {
                Ok(output) if output.status.success() => {
                    debug!("{name} {arg:?} succeeded on attempt {attempt}");
                    return Ok(());
                }
                Ok(output) => {
                    last_err = format!(
                        "{name} exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Err(e) => {
                    last_err = format!("failed to exec {}: {e}", path.display());
                }
            }
            warn!("valve driver attempt {attempt}/{MAX_ATTEMPTS} failed: {last_err}");
        }
        Err(last_err)
    }
}

impl ValvePort for ShellValveController {
    fn activate_zone(&mut self, zone: usize, minutes: f64) -> Result<(), String> {
        info!("opening valve for zone {zone} ({minutes:.1} mins expected)");
        self.run_driver("zone_on", Some(zone))
    }

    fn deactivate_zone(&mut self, zone: usize) -> Result<(), String> {
        info!("closing valve for zone {zone}");
        self.run_driver("zone_off", Some(zone))
    }

    fn close_all(&mut self) -> Result<(), String> {
        info!("closing all valves");
        self.run_driver("zone_all_off", None)
    }
}

/// [`ValvePort`] that only logs. Used for dry runs and development hosts
/// without a valve box attached.
#[derive(Default)]
pub struct LogValveController;

impl ValvePort for LogValveController {
    fn activate_zone(&mut self, zone: usize, minutes: f64) -> Result<(), String> {
        info!("(dry-run) zone {zone} on for {minutes:.1} mins");
        Ok(())
    }

    fn deactivate_zone(&mut self, zone: usize) -> Result<(), String> {
        info!("(dry-run) zone {zone} off");
        Ok(())
    }

    fn close_all(&mut self) -> Result<(), String> {
        info!("(dry-run) all zones off");
        Ok(())
    }
}
