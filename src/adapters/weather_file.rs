//! File-backed weather source.
//!
//! Reads a JSON map of `"YYYY-MM-DD"` to observation, refreshed out of
//! band (cron job hitting whatever feed the installation uses). Keeps the
//! controller core free of network code while still supplying one
//! observation per date.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use log::debug;

use crate::app::ports::WeatherSource;
use crate::history::WeatherObservation;

pub struct FileWeatherSource {
    path: PathBuf,
}

impl FileWeatherSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WeatherSource for FileWeatherSource {
    fn observation_for(
        &mut self,
        station: &str,
        date: NaiveDate,
    ) -> Result<WeatherObservation, String> {
        // Re-read every call; the file is tiny and refreshed externally.
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| format!("read {}: {e}", self.path.display()))?;
        let days: BTreeMap<String, WeatherObservation> =
            serde_json::from_str(&raw).map_err(|e| format!("parse weather cache: {e}"))?;

        let key = date.format("%Y-%m-%d").to_string();
        debug!("weather lookup for {station} on {key}");
        days.get(&key)
            .cloned()
            .ok_or_else(|| format!("no observation for {key} in {}", self.path.display()))
    }
}
