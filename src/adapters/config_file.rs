//! JSON-file configuration persistence.

use std::fs;
use std::path::PathBuf;

use log::info;

use crate::app::ports::ConfigStore;
use crate::config::{load_configuration, Configuration};
use crate::error::ConfigError;

/// [`ConfigStore`] over a single JSON document on disk.
///
/// Saves write to a temp file first and rename into place, so a crash
/// mid-write never leaves a truncated config.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Configuration, ConfigError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            ConfigError::MissingPath(format!("{}: {e}", self.path.display()))
        })?;
        let config = load_configuration(&raw)?;
        info!(
            "loaded configuration from {}: {} zone(s)",
            self.path.display(),
            config.zones.len()
        );
        Ok(config)
    }

    fn save(&mut self, config: &Configuration) -> Result<(), ConfigError> {
        let json = config.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| ConfigError::Syntax(format!("write {}: {e}", self.path.display())))?;
        info!("saved configuration to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_of_missing_file_is_missing_path() {
        let store = FileConfigStore::new("/nonexistent/conf.json");
        assert!(matches!(store.load(), Err(ConfigError::MissingPath(_))));
    }

    #[test]
    fn save_then_load_round_trips() {
        let doc = r#"{
          "GlobalConfig": {"RunTimeAM": "09:00", "AirportCode": "KSJC"},
          "ZoneConfigs": {"0": {"Name": "lawn", "Enabled": true, "DepthIn": 8}},
          "ETAlgorithmSimpleConfig": {"EtPctMap": {"R": [
            {"X1": -1e99, "X2": 1e99, "Y": 100}
          ]}}
        }"#;
        let config = load_configuration(doc).unwrap();

        let path = std::env::temp_dir().join("irrigctl-config-test.json");
        let mut store = FileConfigStore::new(&path);
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), config);
    }
}
