//! Date-indexed history of observed weather and realized run times.
//!
//! A lookup table, not a log: writes are last-write-wins per key and only
//! current values are kept. The store feeds both the schedule/history views
//! and the duration engine's "did this zone already run today" guard.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day's observed (or forecast) weather, keyed by calendar date.
///
/// Later ingestion of the same date overwrites the earlier observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    #[serde(rename = "MinTemp", default)]
    pub min_temp: f64,
    #[serde(rename = "AvgTemp")]
    pub avg_temp: f64,
    #[serde(rename = "MaxTemp", default)]
    pub max_temp: f64,
    #[serde(rename = "Humidity", default)]
    pub humidity: f64,
    #[serde(rename = "WindSpeed", default)]
    pub wind_speed: f64,
    /// Rainfall in inches.
    #[serde(rename = "Precip", default)]
    pub precipitation: f64,
    /// Weather icon name for the schedule table.
    #[serde(rename = "Icon", default)]
    pub icon: String,
}

/// A day's worth of history handed out by [`HistoryStore::range`].
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub weather: Option<WeatherObservation>,
    /// Realized minutes per zone number for this date.
    pub runtimes: Vec<(usize, f64)>,
}

/// In-memory weather / runtime history.
#[derive(Debug, Default)]
pub struct HistoryStore {
    weather: HashMap<NaiveDate, WeatherObservation>,
    runtimes: HashMap<(usize, NaiveDate), f64>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the day's observation. Last write for a date wins.
    pub fn record_weather(&mut self, date: NaiveDate, observation: WeatherObservation) {
        self.weather.insert(date, observation);
    }

    /// Record realized watering minutes for (zone, date). Last write wins.
    pub fn record_runtime(&mut self, zone: usize, date: NaiveDate, minutes: f64) {
        self.runtimes.insert((zone, date), minutes);
    }

    /// Realized minutes for (zone, date); 0 when nothing was recorded.
    pub fn runtime(&self, zone: usize, date: NaiveDate) -> f64 {
        self.runtimes.get(&(zone, date)).copied().unwrap_or(0.0)
    }

    /// Whether any runtime was recorded for (zone, date), even a zero-length
    /// run. Distinguishes "ran for 0 minutes" from "never ran".
    pub fn has_runtime(&self, zone: usize, date: NaiveDate) -> bool {
        self.runtimes.contains_key(&(zone, date))
    }

    pub fn weather(&self, date: NaiveDate) -> Option<&WeatherObservation> {
        self.weather.get(&date)
    }

    /// Lazy inclusive walk over `[from, to]`, one [`DayRecord`] per date.
    pub fn range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = DayRecord> + '_ {
        from.iter_days().take_while(move |d| *d <= to).map(|date| {
            let mut runtimes: Vec<(usize, f64)> = self
                .runtimes
                .iter()
                .filter(|((_, d), _)| *d == date)
                .map(|((zone, _), minutes)| (*zone, *minutes))
                .collect();
            runtimes.sort_unstable_by_key(|(zone, _)| *zone);
            DayRecord { date, weather: self.weather.get(&date).cloned(), runtimes }
        })
    }
}
