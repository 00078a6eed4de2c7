//! Bridges the scheduler's completion callbacks into the history store.

use chrono::NaiveDate;
use log::debug;

use crate::app::ports::RunRecorder;
use crate::history::HistoryStore;

/// [`RunRecorder`] that writes realized run minutes into a [`HistoryStore`]
/// under a fixed date. The service constructs one per tick so "today" is
/// always the wall-clock date of the completion, not of the submission.
pub struct RunHistoryRecorder<'a> {
    store: &'a mut HistoryStore,
    date: NaiveDate,
}

impl<'a> RunHistoryRecorder<'a> {
    pub fn new(store: &'a mut HistoryStore, date: NaiveDate) -> Self {
        Self { store, date }
    }
}

impl RunRecorder for RunHistoryRecorder<'_> {
    fn on_run_completed(&mut self, zone: usize, minutes: f64) {
        debug!("recording {minutes:.2} mins for zone {zone} on {}", self.date);
        self.store.record_runtime(zone, self.date, minutes);
    }
}
