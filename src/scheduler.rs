//! Zone run scheduler: serializes every run request against the single
//! physical water line.
//!
//! ```text
//!   submit ──▶ ┌─────────────┐     expiry / stop     ┌──────────────┐
//!              │ runningSlot │ ────────────────────▶ │ RunRecorder  │
//!              └─────────────┘ ◀── promote (FIFO) ── └──────────────┘
//!              ┌─────────────────────────────┐
//!              │ waitQueue (MAX_QUEUE_SLOTS) │ ◀── submit while busy
//!              └─────────────────────────────┘
//! ```
//!
//! One zone runs at a time. Everything else waits in a bounded FIFO queue;
//! no priorities, no reordering, no starvation. All mutation happens on the
//! caller's tick loop; ports are injected per call, so "zone expired" and
//! "user pressed stop" resolve to the same linearized slot transitions.
//!
//! The slot lifecycle is `IDLE → RUNNING → (EXPIRED | STOPPED) → IDLE`;
//! stop with `destroy` skips the automatic promotion of the next queued run.

use heapless::Vec as BoundedVec;
use log::{info, warn};

use crate::app::ports::{RunRecorder, ValvePort};
use crate::error::SchedulerError;

/// Wait-queue capacity. The running slot is separate, so up to
/// `MAX_QUEUE_SLOTS + 1` requests can be in flight.
pub const MAX_QUEUE_SLOTS: usize = 6;

/// Where a run request came from. Manual requests and auto-schedule
/// requests share the queue on equal FIFO terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSource {
    Manual,
    Scheduled,
}

/// A single request to water one zone. Ephemeral: lives in the queue or
/// the running slot and is destroyed on completion or cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub zone: usize,
    pub requested_minutes: f64,
    pub source: RunSource,
    /// Scheduler tick at which the request was accepted.
    pub submitted_tick: u64,
}

/// Receipt for an accepted request: `slot` 0 is the running slot,
/// `1..=MAX_QUEUE_SLOTS` are wait-queue positions at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle {
    pub slot: usize,
}

#[derive(Debug)]
struct RunningSlot {
    request: RunRequest,
    remaining_secs: u32,
    elapsed_secs: u32,
}

/// What one `tick()` or `stop_running()` did, so the caller can emit
/// events without the scheduler knowing about event sinks.
#[derive(Debug, Default, PartialEq)]
pub struct SlotTransition {
    /// A run finished: (zone, actual minutes reported to the recorder).
    pub completed: Option<(usize, f64)>,
    /// A queued run was promoted into the running slot.
    pub promoted: Option<RunRequest>,
    /// Valve commands that failed while handling this transition.
    pub hardware_failures: Vec<SchedulerError>,
}

/// The scheduler. One instance owns the one physical resource.
pub struct ZoneRunScheduler {
    running: Option<RunningSlot>,
    wait_queue: BoundedVec<RunRequest, MAX_QUEUE_SLOTS>,
    tick_count: u64,
    alarm_count: u32,
}

impl Default for ZoneRunScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneRunScheduler {
    pub fn new() -> Self {
        Self {
            running: None,
            wait_queue: BoundedVec::new(),
            tick_count: 0,
            alarm_count: 0,
        }
    }

    // ── Submission ────────────────────────────────────────────

    /// Submit a run request.
    ///
    /// Starts immediately when the running slot is free, otherwise queues.
    /// Fails with [`SchedulerError::QueueFull`] when every wait slot is
    /// taken; the caller decides whether to retry later.
    pub fn submit(
        &mut self,
        zone: usize,
        minutes: f64,
        source: RunSource,
        valves: &mut dyn ValvePort,
    ) -> Result<RunHandle, SchedulerError> {
        if self.zone_in_flight(zone) {
            // Double submission is permitted (the operator may want a
            // second pass), but worth a trace.
            warn!("zone {zone} is already running or queued; submitting anyway");
        }

        let request = RunRequest {
            zone,
            requested_minutes: minutes,
            source,
            submitted_tick: self.tick_count,
        };

        if self.running.is_none() {
            self.start(request, valves)?;
            return Ok(RunHandle { slot: 0 });
        }

        if self.wait_queue.push(request).is_err() {
            return Err(SchedulerError::QueueFull);
        }
        info!(
            "zone {zone} queued for {minutes:.1} mins at position {}",
            self.wait_queue.len()
        );
        Ok(RunHandle { slot: self.wait_queue.len() })
    }

    // ── Countdown ─────────────────────────────────────────────

    /// Advance the running countdown by one second.
    ///
    /// On expiry the recorder receives the originally requested minutes,
    /// the valve is closed, and the head of the wait queue (if any) is
    /// promoted with a fresh countdown.
    pub fn tick(
        &mut self,
        valves: &mut dyn ValvePort,
        recorder: &mut dyn RunRecorder,
    ) -> SlotTransition {
        self.tick_count += 1;
        let mut transition = SlotTransition::default();

        let expired = match self.running.as_mut() {
            None => return transition,
            Some(slot) => {
                slot.elapsed_secs += 1;
                slot.remaining_secs = slot.remaining_secs.saturating_sub(1);
                slot.remaining_secs == 0
            }
        };
        if !expired {
            return transition;
        }

        // Natural expiry: report the requested duration, not the measured
        // one. The countdown is the run.
        let Some(slot) = self.running.take() else {
            return transition;
        };
        let zone = slot.request.zone;
        let minutes = slot.request.requested_minutes;
        info!("zone {zone} run complete after {minutes:.1} mins");

        if let Err(detail) = valves.deactivate_zone(zone) {
            self.raise_alarm(&mut transition, zone, detail);
        }
        recorder.on_run_completed(zone, minutes);
        transition.completed = Some((zone, minutes));

        self.promote_next(valves, &mut transition);
        transition
    }

    // ── Stop / cancel ─────────────────────────────────────────

    /// Stop the running zone before its countdown expires.
    ///
    /// The recorder receives the *actual* elapsed minutes. Unless `destroy`
    /// is set, the next queued run is promoted exactly as on natural
    /// expiry; with `destroy` the slot is left idle even if runs are
    /// queued ("stop all watering right now").
    pub fn stop_running(
        &mut self,
        destroy: bool,
        valves: &mut dyn ValvePort,
        recorder: &mut dyn RunRecorder,
    ) -> SlotTransition {
        let mut transition = SlotTransition::default();

        if let Some(slot) = self.running.take() {
            let zone = slot.request.zone;
            let actual_minutes = f64::from(slot.elapsed_secs) / 60.0;
            info!(
                "zone {zone} stopped after {actual_minutes:.2} of {:.1} requested mins",
                slot.request.requested_minutes
            );

            if let Err(detail) = valves.deactivate_zone(zone) {
                self.raise_alarm(&mut transition, zone, detail);
            }
            recorder.on_run_completed(zone, actual_minutes);
            transition.completed = Some((zone, actual_minutes));
        }

        if destroy {
            info!("stop-and-halt: {} run(s) left queued", self.wait_queue.len());
        } else {
            self.promote_next(valves, &mut transition);
        }
        transition
    }

    /// Remove a wait-queue entry before it ever runs. `index` is 0-based
    /// within the queue; later entries shift down, preserving FIFO order.
    /// No effect on the running slot.
    pub fn cancel_queued(&mut self, index: usize) -> Result<RunRequest, SchedulerError> {
        if index >= self.wait_queue.len() {
            return Err(SchedulerError::NoSuchSlot { index });
        }
        let request = self.wait_queue.remove(index);
        info!("cancelled queued run for zone {} at slot {index}", request.zone);
        Ok(request)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn running_zone(&self) -> Option<usize> {
        self.running.as_ref().map(|s| s.request.zone)
    }

    /// Seconds left on the running countdown; 0 when idle.
    pub fn remaining_secs(&self) -> u32 {
        self.running.as_ref().map_or(0, |s| s.remaining_secs)
    }

    pub fn queue_depth(&self) -> usize {
        self.wait_queue.len()
    }

    /// Queued requests in run order (head first).
    pub fn queued(&self) -> impl Iterator<Item = &RunRequest> {
        self.wait_queue.iter()
    }

    /// Hardware alarms raised since the last clear, pollable by the UI.
    pub fn alarm_count(&self) -> u32 {
        self.alarm_count
    }

    pub fn clear_alarms(&mut self) {
        self.alarm_count = 0;
    }

    // ── Internal ──────────────────────────────────────────────

    fn zone_in_flight(&self, zone: usize) -> bool {
        self.running_zone() == Some(zone) || self.wait_queue.iter().any(|r| r.zone == zone)
    }

    /// Open the valve and install `request` as the running slot.
    /// On hardware failure the slot stays idle and the alarm is raised.
    fn start(
        &mut self,
        request: RunRequest,
        valves: &mut dyn ValvePort,
    ) -> Result<(), SchedulerError> {
        let zone = request.zone;
        let minutes = request.requested_minutes;
        valves.activate_zone(zone, minutes).map_err(|detail| {
            self.alarm_count += 1;
            warn!("activate zone {zone} failed: {detail}");
            SchedulerError::Hardware { zone, detail }
        })?;

        info!("zone {zone} running for {minutes:.1} mins");
        self.running = Some(RunningSlot {
            remaining_secs: (minutes * 60.0).round() as u32,
            elapsed_secs: 0,
            request,
        });
        Ok(())
    }

    /// Dequeue head entries until one starts or the queue is empty.
    /// A zone whose valve refuses to open is skipped (alarm raised) so a
    /// single bad valve cannot wedge the whole line.
    fn promote_next(&mut self, valves: &mut dyn ValvePort, transition: &mut SlotTransition) {
        while !self.wait_queue.is_empty() {
            let request = self.wait_queue.remove(0);
            match self.start(request.clone(), valves) {
                Ok(()) => {
                    transition.promoted = Some(request);
                    return;
                }
                Err(e) => transition.hardware_failures.push(e),
            }
        }
    }

    fn raise_alarm(&mut self, transition: &mut SlotTransition, zone: usize, detail: String) {
        self.alarm_count += 1;
        warn!("deactivate zone {zone} failed: {detail}");
        transition
            .hardware_failures
            .push(SchedulerError::Hardware { zone, detail });
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Valve port that records every command and can be told to fail.
    struct MockValves {
        calls: std::vec::Vec<(String, usize)>,
        fail_activate_for: Option<usize>,
        fail_deactivate: bool,
    }

    impl MockValves {
        fn new() -> Self {
            Self {
                calls: std::vec::Vec::new(),
                fail_activate_for: None,
                fail_deactivate: false,
            }
        }
    }

    impl ValvePort for MockValves {
        fn activate_zone(&mut self, zone: usize, _minutes: f64) -> Result<(), String> {
            if self.fail_activate_for == Some(zone) {
                return Err("no ack".to_string());
            }
            self.calls.push(("on".to_string(), zone));
            Ok(())
        }

        fn deactivate_zone(&mut self, zone: usize) -> Result<(), String> {
            if self.fail_deactivate {
                return Err("no ack".to_string());
            }
            self.calls.push(("off".to_string(), zone));
            Ok(())
        }

        fn close_all(&mut self) -> Result<(), String> {
            self.calls.push(("all_off".to_string(), 0));
            Ok(())
        }
    }

    /// Recorder that collects completions.
    #[derive(Default)]
    struct Recording {
        completed: std::vec::Vec<(usize, f64)>,
    }

    impl RunRecorder for Recording {
        fn on_run_completed(&mut self, zone: usize, minutes: f64) {
            self.completed.push((zone, minutes));
        }
    }

    fn tick_n(
        sched: &mut ZoneRunScheduler,
        valves: &mut MockValves,
        rec: &mut Recording,
        n: u32,
    ) {
        for _ in 0..n {
            sched.tick(valves, rec);
        }
    }

    #[test]
    fn first_submission_runs_immediately() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();

        let handle = sched.submit(3, 2.0, RunSource::Manual, &mut valves).unwrap();
        assert_eq!(handle.slot, 0);
        assert!(sched.is_running());
        assert_eq!(sched.running_zone(), Some(3));
        assert_eq!(sched.remaining_secs(), 120);
        assert_eq!(valves.calls, vec![("on".to_string(), 3)]);
    }

    #[test]
    fn busy_submissions_queue_fifo() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();

        sched.submit(0, 1.0, RunSource::Manual, &mut valves).unwrap();
        let b = sched.submit(1, 1.0, RunSource::Manual, &mut valves).unwrap();
        let c = sched.submit(2, 1.0, RunSource::Manual, &mut valves).unwrap();
        assert_eq!(b.slot, 1);
        assert_eq!(c.slot, 2);
        assert_eq!(sched.queue_depth(), 2);
        // Only the first zone's valve opened.
        assert_eq!(valves.calls, vec![("on".to_string(), 0)]);
    }

    #[test]
    fn queue_bound_is_enforced() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();

        sched.submit(0, 1.0, RunSource::Manual, &mut valves).unwrap();
        for zone in 1..=MAX_QUEUE_SLOTS {
            sched.submit(zone, 1.0, RunSource::Manual, &mut valves).unwrap();
        }
        let err = sched
            .submit(7, 1.0, RunSource::Manual, &mut valves)
            .unwrap_err();
        assert_eq!(err, SchedulerError::QueueFull);
        assert_eq!(sched.queue_depth(), MAX_QUEUE_SLOTS);
    }

    #[test]
    fn countdown_expires_and_promotes_in_submission_order() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        // B asks for a longer run than C but still goes first: strict FIFO.
        sched.submit(0, 1.0, RunSource::Manual, &mut valves).unwrap();
        sched.submit(1, 3.0, RunSource::Manual, &mut valves).unwrap();
        sched.submit(2, 1.0, RunSource::Manual, &mut valves).unwrap();

        tick_n(&mut sched, &mut valves, &mut rec, 60);
        assert_eq!(sched.running_zone(), Some(1));
        assert_eq!(sched.remaining_secs(), 180);

        tick_n(&mut sched, &mut valves, &mut rec, 180);
        assert_eq!(sched.running_zone(), Some(2));

        tick_n(&mut sched, &mut valves, &mut rec, 60);
        assert!(!sched.is_running());
        assert_eq!(rec.completed, vec![(0, 1.0), (1, 3.0), (2, 1.0)]);
    }

    #[test]
    fn expiry_reports_requested_minutes() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        sched.submit(4, 0.5, RunSource::Scheduled, &mut valves).unwrap();
        tick_n(&mut sched, &mut valves, &mut rec, 30);
        assert_eq!(rec.completed, vec![(4, 0.5)]);
        assert!(valves.calls.contains(&("off".to_string(), 4)));
    }

    #[test]
    fn stop_and_promote_reports_actual_elapsed() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        sched.submit(0, 10.0, RunSource::Manual, &mut valves).unwrap();
        sched.submit(1, 5.0, RunSource::Manual, &mut valves).unwrap();

        tick_n(&mut sched, &mut valves, &mut rec, 90); // 1.5 minutes in
        let transition = sched.stop_running(false, &mut valves, &mut rec);

        assert_eq!(transition.completed, Some((0, 1.5)));
        assert_eq!(transition.promoted.as_ref().unwrap().zone, 1);
        assert_eq!(rec.completed, vec![(0, 1.5)]);
        // B gets a fresh, full countdown.
        assert_eq!(sched.running_zone(), Some(1));
        assert_eq!(sched.remaining_secs(), 300);
        assert_eq!(sched.queue_depth(), 0);
    }

    #[test]
    fn stop_and_halt_leaves_queue_untouched() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        sched.submit(0, 10.0, RunSource::Manual, &mut valves).unwrap();
        sched.submit(1, 5.0, RunSource::Manual, &mut valves).unwrap();

        tick_n(&mut sched, &mut valves, &mut rec, 60);
        let transition = sched.stop_running(true, &mut valves, &mut rec);

        assert_eq!(transition.completed, Some((0, 1.0)));
        assert_eq!(transition.promoted, None);
        assert!(!sched.is_running());
        assert_eq!(sched.queue_depth(), 1);
        assert_eq!(sched.queued().next().unwrap().zone, 1);
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        let transition = sched.stop_running(false, &mut valves, &mut rec);
        assert_eq!(transition, SlotTransition::default());
        assert!(rec.completed.is_empty());
    }

    #[test]
    fn cancel_queued_shifts_later_entries_down() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();

        sched.submit(0, 1.0, RunSource::Manual, &mut valves).unwrap();
        for zone in [5, 6, 7] {
            sched.submit(zone, 1.0, RunSource::Manual, &mut valves).unwrap();
        }

        let cancelled = sched.cancel_queued(1).unwrap();
        assert_eq!(cancelled.zone, 6);
        let order: std::vec::Vec<usize> = sched.queued().map(|r| r.zone).collect();
        assert_eq!(order, vec![5, 7]);
        // Running slot untouched.
        assert_eq!(sched.running_zone(), Some(0));
    }

    #[test]
    fn cancel_beyond_queue_depth_is_an_error() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();

        sched.submit(0, 1.0, RunSource::Manual, &mut valves).unwrap();
        assert_eq!(
            sched.cancel_queued(0).unwrap_err(),
            SchedulerError::NoSuchSlot { index: 0 }
        );
    }

    #[test]
    fn double_submission_of_same_zone_is_permitted() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();

        sched.submit(2, 1.0, RunSource::Manual, &mut valves).unwrap();
        let again = sched.submit(2, 1.0, RunSource::Scheduled, &mut valves);
        assert!(again.is_ok());
        assert_eq!(sched.queue_depth(), 1);
    }

    #[test]
    fn activation_failure_surfaces_and_raises_alarm() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        valves.fail_activate_for = Some(3);

        let err = sched.submit(3, 1.0, RunSource::Manual, &mut valves).unwrap_err();
        assert!(matches!(err, SchedulerError::Hardware { zone: 3, .. }));
        assert!(!sched.is_running());
        assert_eq!(sched.alarm_count(), 1);

        sched.clear_alarms();
        assert_eq!(sched.alarm_count(), 0);
    }

    #[test]
    fn bad_valve_on_promotion_is_skipped_not_wedged() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        sched.submit(0, 1.0, RunSource::Manual, &mut valves).unwrap();
        sched.submit(1, 1.0, RunSource::Manual, &mut valves).unwrap();
        sched.submit(2, 1.0, RunSource::Manual, &mut valves).unwrap();

        // Zone 1's valve refuses to open at promotion time.
        valves.fail_activate_for = Some(1);
        tick_n(&mut sched, &mut valves, &mut rec, 60);

        // Zone 1 was skipped, zone 2 is running, alarm raised.
        assert_eq!(sched.running_zone(), Some(2));
        assert_eq!(sched.queue_depth(), 0);
        assert_eq!(sched.alarm_count(), 1);
    }

    #[test]
    fn deactivate_failure_still_records_and_promotes() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        sched.submit(0, 1.0, RunSource::Manual, &mut valves).unwrap();
        sched.submit(1, 1.0, RunSource::Manual, &mut valves).unwrap();

        valves.fail_deactivate = true;
        let mut last = SlotTransition::default();
        for _ in 0..60 {
            last = sched.tick(&mut valves, &mut rec);
        }

        assert_eq!(last.completed, Some((0, 1.0)));
        assert_eq!(last.promoted.as_ref().unwrap().zone, 1);
        assert_eq!(last.hardware_failures.len(), 1);
        assert_eq!(rec.completed, vec![(0, 1.0)]);
        assert_eq!(sched.alarm_count(), 1);
    }

    #[test]
    fn tick_when_idle_does_nothing() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        let transition = sched.tick(&mut valves, &mut rec);
        assert_eq!(transition, SlotTransition::default());
        assert_eq!(sched.remaining_secs(), 0);
    }

    #[test]
    fn resubmission_after_completion_starts_fresh() {
        let mut sched = ZoneRunScheduler::new();
        let mut valves = MockValves::new();
        let mut rec = Recording::default();

        sched.submit(0, 1.0, RunSource::Manual, &mut valves).unwrap();
        tick_n(&mut sched, &mut valves, &mut rec, 60);
        assert!(!sched.is_running());

        let handle = sched.submit(0, 2.0, RunSource::Manual, &mut valves).unwrap();
        assert_eq!(handle.slot, 0);
        assert_eq!(sched.remaining_secs(), 120);
    }
}
