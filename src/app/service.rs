//! Controller service: the orchestration layer tying the configuration
//! model, the ET duration engine, the history store, and the zone run
//! scheduler together behind a single command/event surface.
//!
//! The service is single-threaded by construction: the daemon calls
//! [`ControllerService::tick`] once a second and feeds commands in between.
//! Ports (valves, event sink) are injected per call, never stored, so the
//! whole thing is testable with plain mocks.

use chrono::NaiveDate;
use log::{info, warn};

use crate::config::{Configuration, TimeOfDay};
use crate::engine;
use crate::error::{Error, SchedulerError};
use crate::history::{HistoryStore, WeatherObservation};
use crate::recorder::RunHistoryRecorder;
use crate::scheduler::{RunSource, SlotTransition, ZoneRunScheduler};

use super::commands::ControllerCommand;
use super::events::{ControllerEvent, StatusSnapshot};
use super::ports::{EventSink, ValvePort};

pub struct ControllerService {
    config: Configuration,
    history: HistoryStore,
    scheduler: ZoneRunScheduler,
}

impl ControllerService {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            history: HistoryStore::new(),
            scheduler: ZoneRunScheduler::new(),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Store the day's weather observation for later duration computation
    /// and history views. Last write for a date wins.
    pub fn ingest_weather(&mut self, date: NaiveDate, observation: WeatherObservation) {
        self.history.record_weather(date, observation);
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command(
        &mut self,
        command: ControllerCommand,
        today: NaiveDate,
        valves: &mut dyn ValvePort,
        sink: &mut dyn EventSink,
    ) -> Result<(), Error> {
        match command {
            ControllerCommand::RunZone { zone, minutes } => {
                // Manual runs only require the zone to exist; a disabled
                // zone can still be exercised by hand.
                if self.config.zone(zone).is_none() {
                    return Err(SchedulerError::NoSuchZone { zone }.into());
                }
                self.submit(zone, minutes, RunSource::Manual, valves, sink)?;
                Ok(())
            }
            ControllerCommand::StopRunning { destroy } => {
                let transition = {
                    let mut recorder = RunHistoryRecorder::new(&mut self.history, today);
                    self.scheduler.stop_running(destroy, valves, &mut recorder)
                };
                emit_transition(&transition, sink);
                Ok(())
            }
            ControllerCommand::CancelQueued { index } => {
                let request = self.scheduler.cancel_queued(index)?;
                sink.emit(&ControllerEvent::RunCancelled { zone: request.zone });
                Ok(())
            }
            ControllerCommand::UpdateConfig(config) => {
                info!("configuration updated: {} zone(s)", config.zones.len());
                self.config = config;
                sink.emit(&ControllerEvent::ConfigUpdated);
                Ok(())
            }
            ControllerCommand::ClearAlarms => {
                self.scheduler.clear_alarms();
                Ok(())
            }
        }
    }

    // ── Tick loop ─────────────────────────────────────────────

    /// Advance the scheduler by one second and emit the resulting events.
    pub fn tick(
        &mut self,
        today: NaiveDate,
        valves: &mut dyn ValvePort,
        sink: &mut dyn EventSink,
    ) {
        let transition = {
            let mut recorder = RunHistoryRecorder::new(&mut self.history, today);
            self.scheduler.tick(valves, &mut recorder)
        };
        emit_transition(&transition, sink);
    }

    // ── Auto-schedule ─────────────────────────────────────────

    /// Submit ET-derived runs for every zone due today.
    ///
    /// A zone is due when it is enabled and has no recorded runtime for
    /// `date` yet, so a restart mid-morning never double-waters. Zones
    /// whose computed duration is zero are recorded as a zero-length run,
    /// marking them handled for the day.
    pub fn run_auto_schedule(
        &mut self,
        date: NaiveDate,
        valves: &mut dyn ValvePort,
        sink: &mut dyn EventSink,
    ) -> Result<(), Error> {
        let Some(observation) = self.history.weather(date).cloned() else {
            warn!("no weather observation for {date}, skipping auto-schedule");
            return Ok(());
        };

        let due: Vec<_> = self
            .config
            .zones
            .values()
            .filter(|z| z.enabled && !self.history.has_runtime(z.number, date))
            .cloned()
            .collect();

        for zone in due {
            let zone_number = zone.number;
            let minutes = engine::compute_duration(&zone, &observation, &self.config.et_map)?;

            if minutes <= 0.0 {
                info!("zone {zone_number} needs no water today ({date})");
                self.history.record_runtime(zone_number, date, 0.0);
                continue;
            }

            // Submission failures leave the zone unmarked so a later pass
            // can retry it, and never abort the loop: one stuck valve or a
            // full queue must not starve the remaining zones.
            match self.submit(zone_number, minutes, RunSource::Scheduled, valves, sink) {
                Ok(()) => {}
                Err(Error::Scheduler(SchedulerError::QueueFull)) => {
                    warn!("queue full, zone {zone_number} not scheduled for {date}");
                }
                Err(Error::Scheduler(SchedulerError::Hardware { .. })) => {
                    warn!("valve failure, zone {zone_number} not scheduled for {date}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ── Status ────────────────────────────────────────────────

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            running_zone: self.scheduler.running_zone(),
            remaining_secs: self.scheduler.remaining_secs(),
            queued_zones: self.scheduler.queued().map(|r| r.zone).collect(),
            alarm_count: self.scheduler.alarm_count(),
        }
    }

    pub fn alarm_count(&self) -> u32 {
        self.scheduler.alarm_count()
    }

    /// Latest configured trigger at or before `seconds_into_day`, if any.
    ///
    /// The daemon's tick period is a sleep plus work, so wall-clock seconds
    /// get skipped; matching a trigger second exactly would lose whole
    /// days. The daemon fires on the first tick at or past a trigger and
    /// deduplicates with a last-fired guard of its own.
    pub fn due_trigger(&self, seconds_into_day: u32) -> Option<TimeOfDay> {
        let mut triggers = vec![self.config.global.run_time_am];
        triggers.extend(self.config.global.run_time_pm);
        triggers
            .into_iter()
            .filter(|t| t.seconds_from_midnight() <= seconds_into_day)
            .max()
    }

    // ── Internal ──────────────────────────────────────────────

    fn submit(
        &mut self,
        zone: usize,
        minutes: f64,
        source: RunSource,
        valves: &mut dyn ValvePort,
        sink: &mut dyn EventSink,
    ) -> Result<(), Error> {
        match self.scheduler.submit(zone, minutes, source, valves) {
            Ok(handle) if handle.slot == 0 => {
                sink.emit(&ControllerEvent::RunStarted { zone, minutes, source });
                Ok(())
            }
            Ok(handle) => {
                sink.emit(&ControllerEvent::RunQueued { zone, minutes, position: handle.slot });
                Ok(())
            }
            Err(SchedulerError::QueueFull) => {
                sink.emit(&ControllerEvent::QueueRejected { zone });
                Err(SchedulerError::QueueFull.into())
            }
            Err(SchedulerError::Hardware { zone, detail }) => {
                sink.emit(&ControllerEvent::AlarmRaised { zone, detail: detail.clone() });
                Err(SchedulerError::Hardware { zone, detail }.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn emit_transition(transition: &SlotTransition, sink: &mut dyn EventSink) {
    if let Some((zone, minutes)) = transition.completed {
        sink.emit(&ControllerEvent::RunCompleted { zone, minutes });
    }
    if let Some(request) = &transition.promoted {
        sink.emit(&ControllerEvent::RunStarted {
            zone: request.zone,
            minutes: request.requested_minutes,
            source: request.source,
        });
    }
    for failure in &transition.hardware_failures {
        if let SchedulerError::Hardware { zone, detail } = failure {
            sink.emit(&ControllerEvent::AlarmRaised { zone: *zone, detail: detail.clone() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::NullEventSink;
    use crate::config::load_configuration;

    struct NoopValves;

    impl ValvePort for NoopValves {
        fn activate_zone(&mut self, _zone: usize, _minutes: f64) -> Result<(), String> {
            Ok(())
        }
        fn deactivate_zone(&mut self, _zone: usize) -> Result<(), String> {
            Ok(())
        }
        fn close_all(&mut self) -> Result<(), String> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        events: Vec<ControllerEvent>,
    }

    impl EventSink for CollectingSink {
        fn emit(&mut self, event: &ControllerEvent) {
            self.events.push(event.clone());
        }
    }

    fn test_config() -> Configuration {
        load_configuration(
            r#"{
              "GlobalConfig": {"RunTimeAM": "09:00", "AirportCode": "KSJC"},
              "ZoneConfigs": {
                "0": {"Name": "lawn", "Enabled": true, "DepthIn": 8, "ZoneETRate": 1,
                      "RunTimeMultiplier": 1},
                "1": {"Name": "beds", "Enabled": true, "DepthIn": 9, "ZoneETRate": 2,
                      "RunTimeMultiplier": 2},
                "2": {"Name": "shade", "Enabled": false, "DepthIn": 8, "ZoneETRate": 1}
              },
              "ETAlgorithmSimpleConfig": {"EtPctMap": {"R": [
                {"X1": -1e99, "X2": 50, "Y": 25},
                {"X1": 50, "X2": 65, "Y": 50},
                {"X1": 65, "X2": 75, "Y": 75},
                {"X1": 75, "X2": 1e99, "Y": 100}
              ]}}
            }"#,
        )
        .unwrap()
    }

    fn observation(avg_temp: f64) -> WeatherObservation {
        WeatherObservation {
            min_temp: avg_temp - 10.0,
            avg_temp,
            max_temp: avg_temp + 10.0,
            humidity: 30.0,
            wind_speed: 2.0,
            precipitation: 0.0,
            icon: "sunny".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn manual_run_rejects_unknown_zone() {
        let mut service = ControllerService::new(test_config());
        let err = service
            .handle_command(
                ControllerCommand::RunZone { zone: 9, minutes: 5.0 },
                today(),
                &mut NoopValves,
                &mut NullEventSink,
            )
            .unwrap_err();
        assert_eq!(err, Error::Scheduler(SchedulerError::NoSuchZone { zone: 9 }));
    }

    #[test]
    fn manual_run_allowed_for_disabled_zone() {
        let mut service = ControllerService::new(test_config());
        let mut sink = CollectingSink::default();
        service
            .handle_command(
                ControllerCommand::RunZone { zone: 2, minutes: 3.0 },
                today(),
                &mut NoopValves,
                &mut sink,
            )
            .unwrap();
        assert_eq!(service.status().running_zone, Some(2));
        assert!(matches!(sink.events[0], ControllerEvent::RunStarted { zone: 2, .. }));
    }

    #[test]
    fn auto_schedule_submits_enabled_zones_only() {
        let mut service = ControllerService::new(test_config());
        service.ingest_weather(today(), observation(70.0));

        let mut sink = CollectingSink::default();
        service
            .run_auto_schedule(today(), &mut NoopValves, &mut sink)
            .unwrap();

        // Zone 0 runs, zone 1 queues, disabled zone 2 is untouched.
        let status = service.status();
        assert_eq!(status.running_zone, Some(0));
        assert_eq!(status.queued_zones, vec![1]);
        assert!(!service.history.has_runtime(2, today()));
    }

    #[test]
    fn auto_schedule_skips_zones_that_already_ran_today() {
        let mut service = ControllerService::new(test_config());
        service.ingest_weather(today(), observation(70.0));
        service.history.record_runtime(0, today(), 6.0);

        let mut sink = CollectingSink::default();
        service
            .run_auto_schedule(today(), &mut NoopValves, &mut sink)
            .unwrap();

        assert_eq!(service.status().running_zone, Some(1));
        assert_eq!(service.status().queued_zones, Vec::<usize>::new());
    }

    #[test]
    fn auto_schedule_records_zero_for_dry_zones() {
        let mut service = ControllerService::new(test_config());
        // Heavy rain drives every duration to zero.
        let mut soaked = observation(70.0);
        soaked.precipitation = 5.0;
        service.ingest_weather(today(), soaked);
        for zone in service.config.zones.values_mut() {
            zone.gets_rain = true;
        }

        service
            .run_auto_schedule(today(), &mut NoopValves, &mut NullEventSink)
            .unwrap();

        assert!(service.history.has_runtime(0, today()));
        assert_eq!(service.history.runtime(0, today()), 0.0);
        assert!(service.status().running_zone.is_none());
    }

    #[test]
    fn auto_schedule_without_weather_is_a_no_op() {
        let mut service = ControllerService::new(test_config());
        service
            .run_auto_schedule(today(), &mut NoopValves, &mut NullEventSink)
            .unwrap();
        assert!(service.status().running_zone.is_none());
        assert!(!service.history.has_runtime(0, today()));
    }

    #[test]
    fn tick_to_completion_records_history_and_emits_events() {
        let mut service = ControllerService::new(test_config());
        let mut sink = CollectingSink::default();
        service
            .handle_command(
                ControllerCommand::RunZone { zone: 0, minutes: 1.0 },
                today(),
                &mut NoopValves,
                &mut sink,
            )
            .unwrap();

        for _ in 0..60 {
            service.tick(today(), &mut NoopValves, &mut sink);
        }

        assert!(service.status().running_zone.is_none());
        assert_eq!(service.history.runtime(0, today()), 1.0);
        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, ControllerEvent::RunCompleted { zone: 0, .. })));
    }

    #[test]
    fn stop_records_elapsed_and_promotes() {
        let mut service = ControllerService::new(test_config());
        let mut sink = CollectingSink::default();
        for zone in [0, 1] {
            service
                .handle_command(
                    ControllerCommand::RunZone { zone, minutes: 10.0 },
                    today(),
                    &mut NoopValves,
                    &mut sink,
                )
                .unwrap();
        }
        for _ in 0..30 {
            service.tick(today(), &mut NoopValves, &mut sink);
        }

        service
            .handle_command(
                ControllerCommand::StopRunning { destroy: false },
                today(),
                &mut NoopValves,
                &mut sink,
            )
            .unwrap();

        assert_eq!(service.history.runtime(0, today()), 0.5);
        assert_eq!(service.status().running_zone, Some(1));
    }

    #[test]
    fn config_update_preserves_runs_in_flight() {
        let mut service = ControllerService::new(test_config());
        let mut sink = CollectingSink::default();
        service
            .handle_command(
                ControllerCommand::RunZone { zone: 0, minutes: 5.0 },
                today(),
                &mut NoopValves,
                &mut sink,
            )
            .unwrap();

        service
            .handle_command(
                ControllerCommand::UpdateConfig(test_config()),
                today(),
                &mut NoopValves,
                &mut sink,
            )
            .unwrap();

        assert_eq!(service.status().running_zone, Some(0));
        assert!(sink.events.contains(&ControllerEvent::ConfigUpdated));
    }

    #[test]
    fn auto_schedule_skips_failed_valve_and_continues() {
        struct OneBadValve;
        impl ValvePort for OneBadValve {
            fn activate_zone(&mut self, zone: usize, _minutes: f64) -> Result<(), String> {
                if zone == 0 {
                    Err("no ack".to_string())
                } else {
                    Ok(())
                }
            }
            fn deactivate_zone(&mut self, _zone: usize) -> Result<(), String> {
                Ok(())
            }
            fn close_all(&mut self) -> Result<(), String> {
                Ok(())
            }
        }

        let mut service = ControllerService::new(test_config());
        service.ingest_weather(today(), observation(70.0));

        let mut sink = CollectingSink::default();
        service
            .run_auto_schedule(today(), &mut OneBadValve, &mut sink)
            .unwrap();

        // Zone 0's stuck valve raises an alarm but zone 1 still waters.
        assert_eq!(service.status().running_zone, Some(1));
        assert_eq!(service.alarm_count(), 1);
        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, ControllerEvent::AlarmRaised { zone: 0, .. })));
        // Zone 0 stays unmarked so a later pass can retry it.
        assert!(!service.history.has_runtime(0, today()));
    }

    #[test]
    fn due_trigger_fires_at_and_past_the_configured_second() {
        let service = ControllerService::new(test_config());
        let am = service.config.global.run_time_am;

        assert_eq!(service.due_trigger(9 * 3600 - 1), None);
        assert_eq!(service.due_trigger(9 * 3600), Some(am));
        // The tick loop routinely skips seconds; a late tick still fires.
        assert_eq!(service.due_trigger(9 * 3600 + 17), Some(am));
        assert_eq!(service.due_trigger(23 * 3600), Some(am));
    }

    #[test]
    fn due_trigger_prefers_the_latest_past_trigger() {
        let mut config = test_config();
        config.global.run_time_pm = Some(TimeOfDay { hour: 16, minute: 30, second: 0 });
        let service = ControllerService::new(config);

        let am = service.config.global.run_time_am;
        let pm = service.config.global.run_time_pm.unwrap();
        assert_eq!(service.due_trigger(12 * 3600), Some(am));
        assert_eq!(service.due_trigger(16 * 3600 + 30 * 60), Some(pm));
        assert_eq!(service.due_trigger(20 * 3600), Some(pm));
    }
}
