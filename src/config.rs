//! Configuration model.
//!
//! Loads the controller's JSON configuration document (the original
//! `conf/scheduler_conf.json` layout), applies typed defaults to every
//! optional per-zone field, and validates the rest. After a successful
//! load no field is ever "missing" at consumption time; required paths are
//! rejected at load with [`ConfigError::MissingPath`], not at point-of-use.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Placeholder for absent display labels, kept from the original UI so
/// unconfigured zones are visibly unconfigured instead of blank.
pub const MISSING_NAME: &str = "##MISSING##";

/// Sentinel clamps for the open ends of the ET mapping table.
pub const NEG_SENTINEL: f64 = -1e99;
pub const POS_SENTINEL: f64 = 1e99;

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

/// A scheduled time of day (the nightly run trigger).
///
/// Accepts `HH:MM`, `HH:MM:SS`, and the historical serialized form
/// `0000-01-01THH:MM:SSZ` (date prefix and trailing `Z` are stripped before
/// the colon split). Anything else is a [`ConfigError::MalformedTimeField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub fn parse(field: &str, raw: &str) -> Result<Self, ConfigError> {
        let malformed = || ConfigError::MalformedTimeField {
            field: field.to_string(),
            value: raw.to_string(),
        };

        // Strip the "0000-01-01T...Z" wrapping if present.
        let s = raw.rsplit('T').next().unwrap_or(raw);
        let s = s.strip_suffix('Z').unwrap_or(s);

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(malformed());
        }

        let hour: u8 = parts[0].parse().map_err(|_| malformed())?;
        let minute: u8 = parts[1].parse().map_err(|_| malformed())?;
        let second: u8 = if parts.len() == 3 {
            parts[2].parse().map_err(|_| malformed())?
        } else {
            0
        };

        if hour > 23 || minute > 59 || second > 59 {
            return Err(malformed());
        }

        Ok(Self { hour, minute, second })
    }

    /// Seconds since midnight, for "is it time to run yet" comparisons.
    pub fn seconds_from_midnight(self) -> u32 {
        u32::from(self.hour) * 3600 + u32::from(self.minute) * 60 + u32::from(self.second)
    }
}

impl core::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

// ---------------------------------------------------------------------------
// Validated model
// ---------------------------------------------------------------------------

/// Settings independent of any zone.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    /// Nightly auto-schedule trigger.
    pub run_time_am: TimeOfDay,
    /// Optional second trigger, unset in most installations.
    pub run_time_pm: Option<TimeOfDay>,
    /// Weather station identifier handed to the external weather source.
    pub airport_code: String,
}

/// Configuration for a single irrigation zone.
///
/// All fields are populated (defaulted) at load; `number` is unique within
/// the zone collection and matches its map key.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneConfig {
    pub number: usize,
    pub name: String,
    pub enabled: bool,
    pub gets_rain: bool,
    pub soil_name: String,
    pub min_vwc: f64,
    pub max_vwc: f64,
    pub run_time_multiplier: f64,
    pub zone_et_rate: f64,
    pub depth_in: f64,
}

/// Shared soil parameters referenced by zones via `soil_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilConfig {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "MaxVWC")]
    pub max_vwc: f64,
}

/// One half-open range `[from, to)` of the ET mapping table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtRange {
    pub from: f64,
    pub to: f64,
    pub drying_percent: f64,
}

/// Ordered, contiguous, total-covering temperature → drying-percent map.
///
/// Normalised at load: sorted ascending by `from`, first `from` clamped to
/// [`NEG_SENTINEL`], last `to` clamped to [`POS_SENTINEL`], contiguity
/// verified. Lookup of any finite temperature yields exactly one value.
#[derive(Debug, Clone, PartialEq)]
pub struct EtMappingTable {
    ranges: Vec<EtRange>,
}

impl EtMappingTable {
    /// Build a table from raw ranges, normalising and checking invariants.
    pub fn new(mut ranges: Vec<EtRange>) -> Result<Self, ConfigError> {
        const FIELD: &str = "ETAlgorithmSimpleConfig.EtPctMap.R";
        if ranges.is_empty() {
            return Err(ConfigError::MissingPath(FIELD.to_string()));
        }

        ranges.sort_by(|a, b| a.from.total_cmp(&b.from));

        // Clamp the open ends so the table covers the whole real line.
        if let Some(first) = ranges.first_mut() {
            first.from = NEG_SENTINEL;
        }
        if let Some(last) = ranges.last_mut() {
            last.to = POS_SENTINEL;
        }

        for pair in ranges.windows(2) {
            if (pair[0].to - pair[1].from).abs() > f64::EPSILON {
                return Err(ConfigError::InvalidNumericField {
                    field: FIELD.to_string(),
                    reason: format!(
                        "ranges are not contiguous: [..{}) then [{}..)",
                        pair[0].to, pair[1].from
                    ),
                });
            }
        }
        for r in &ranges {
            if r.from >= r.to {
                return Err(ConfigError::InvalidNumericField {
                    field: FIELD.to_string(),
                    reason: format!("empty range [{}..{})", r.from, r.to),
                });
            }
        }

        Ok(Self { ranges })
    }

    /// Drying percent for the unique range containing `temp`.
    pub fn drying_percent(&self, temp: f64) -> Option<f64> {
        self.ranges
            .iter()
            .find(|r| temp >= r.from && temp < r.to)
            .map(|r| r.drying_percent)
    }

    pub fn ranges(&self) -> &[EtRange] {
        &self.ranges
    }
}

/// A complete, validated controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub global: GlobalConfig,
    /// Keyed by zone number; may be sparse.
    pub zones: BTreeMap<usize, ZoneConfig>,
    pub soils: BTreeMap<String, SoilConfig>,
    pub et_map: EtMappingTable,
}

impl Configuration {
    /// Number of zones, derived as `max(zone.number) + 1`, not stored.
    /// Stays consistent even when zone numbers are sparse.
    pub fn zone_count(&self) -> usize {
        self.zones.keys().next_back().map_or(0, |n| n + 1)
    }

    pub fn zone(&self, number: usize) -> Option<&ZoneConfig> {
        self.zones.get(&number)
    }

    /// Soil parameters for a zone, when its `soil_name` resolves.
    pub fn soil_for(&self, zone: &ZoneConfig) -> Option<&SoilConfig> {
        self.soils.get(&zone.soil_name)
    }

    /// Serialize back to the original document layout.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        let raw = RawDocument::from_config(self);
        serde_json::to_string_pretty(&raw).map_err(|e| ConfigError::Syntax(e.to_string()))
    }
}

/// Parse and validate a configuration document.
pub fn load_configuration(raw: &str) -> Result<Configuration, ConfigError> {
    let doc: RawDocument =
        serde_json::from_str(raw).map_err(|e| ConfigError::Syntax(e.to_string()))?;
    doc.into_config()
}

// ---------------------------------------------------------------------------
// Raw (wire) document, original JSON key names
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct RawDocument {
    #[serde(rename = "GlobalConfig", skip_serializing_if = "Option::is_none")]
    global: Option<RawGlobal>,
    #[serde(rename = "ZoneConfigs", default)]
    zones: BTreeMap<String, RawZone>,
    #[serde(rename = "SoilConfigMap", default)]
    soils: BTreeMap<String, SoilConfig>,
    #[serde(rename = "ETAlgorithmSimpleConfig", skip_serializing_if = "Option::is_none")]
    algorithm: Option<RawAlgorithm>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawGlobal {
    #[serde(rename = "RunTimeAM", skip_serializing_if = "Option::is_none")]
    run_time_am: Option<String>,
    #[serde(rename = "RunTimePM", skip_serializing_if = "Option::is_none")]
    run_time_pm: Option<String>,
    #[serde(rename = "AirportCode", skip_serializing_if = "Option::is_none")]
    airport_code: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawZone {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "Number", skip_serializing_if = "Option::is_none")]
    number: Option<i64>,
    #[serde(rename = "Enabled", skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(rename = "GetsRain", skip_serializing_if = "Option::is_none")]
    gets_rain: Option<bool>,
    #[serde(rename = "SoilConfig", skip_serializing_if = "Option::is_none")]
    soil: Option<RawSoilRef>,
    #[serde(rename = "MinVWC", skip_serializing_if = "Option::is_none")]
    min_vwc: Option<f64>,
    #[serde(rename = "MaxVWC", skip_serializing_if = "Option::is_none")]
    max_vwc: Option<f64>,
    #[serde(rename = "RunTimeMultiplier", skip_serializing_if = "Option::is_none")]
    run_time_multiplier: Option<f64>,
    #[serde(rename = "ZoneETRate", skip_serializing_if = "Option::is_none")]
    zone_et_rate: Option<f64>,
    #[serde(rename = "DepthIn", skip_serializing_if = "Option::is_none")]
    depth_in: Option<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawSoilRef {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawAlgorithm {
    #[serde(rename = "EtPctMap")]
    et_pct_map: Option<RawEtPctMap>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawEtPctMap {
    #[serde(rename = "R", default)]
    ranges: Vec<RawRange>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawRange {
    #[serde(rename = "X1")]
    x1: f64,
    #[serde(rename = "X2")]
    x2: f64,
    #[serde(rename = "Y")]
    y: f64,
}

impl RawDocument {
    fn into_config(self) -> Result<Configuration, ConfigError> {
        let global = self
            .global
            .ok_or_else(|| ConfigError::MissingPath("GlobalConfig".to_string()))?;

        let run_time_am_raw = global
            .run_time_am
            .ok_or_else(|| ConfigError::MissingPath("GlobalConfig.RunTimeAM".to_string()))?;
        let run_time_am = TimeOfDay::parse("GlobalConfig.RunTimeAM", &run_time_am_raw)?;
        let run_time_pm = global
            .run_time_pm
            .as_deref()
            .map(|s| TimeOfDay::parse("GlobalConfig.RunTimePM", s))
            .transpose()?;

        let airport_code = match global.airport_code {
            Some(code) if !code.is_empty() => code,
            _ => return Err(ConfigError::MissingPath("GlobalConfig.AirportCode".to_string())),
        };

        if self.zones.is_empty() {
            return Err(ConfigError::MissingPath("ZoneConfigs".to_string()));
        }

        let mut zones = BTreeMap::new();
        for (key, raw) in self.zones {
            let zone = raw.into_zone(&key)?;
            let number = zone.number;
            // Distinct keys like "0" and "00" parse to the same number.
            if zones.insert(number, zone).is_some() {
                return Err(ConfigError::InvalidNumericField {
                    field: format!("ZoneConfigs.{key}"),
                    reason: format!("duplicate zone number {number}"),
                });
            }
        }

        let ranges = self
            .algorithm
            .and_then(|a| a.et_pct_map)
            .map(|m| m.ranges)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                ConfigError::MissingPath("ETAlgorithmSimpleConfig.EtPctMap.R".to_string())
            })?;
        let et_map = EtMappingTable::new(
            ranges
                .into_iter()
                .map(|r| EtRange { from: r.x1, to: r.x2, drying_percent: r.y })
                .collect(),
        )?;

        Ok(Configuration {
            global: GlobalConfig { run_time_am, run_time_pm, airport_code },
            zones,
            soils: self.soils,
            et_map,
        })
    }

    fn from_config(config: &Configuration) -> Self {
        Self {
            global: Some(RawGlobal {
                run_time_am: Some(config.global.run_time_am.to_string()),
                run_time_pm: config.global.run_time_pm.map(|t| t.to_string()),
                airport_code: Some(config.global.airport_code.clone()),
            }),
            zones: config
                .zones
                .values()
                .map(|z| {
                    (
                        z.number.to_string(),
                        RawZone {
                            name: Some(z.name.clone()),
                            number: Some(z.number as i64),
                            enabled: Some(z.enabled),
                            gets_rain: Some(z.gets_rain),
                            soil: Some(RawSoilRef { name: Some(z.soil_name.clone()) }),
                            min_vwc: Some(z.min_vwc),
                            max_vwc: Some(z.max_vwc),
                            run_time_multiplier: Some(z.run_time_multiplier),
                            zone_et_rate: Some(z.zone_et_rate),
                            depth_in: Some(z.depth_in),
                        },
                    )
                })
                .collect(),
            soils: config.soils.clone(),
            algorithm: Some(RawAlgorithm {
                et_pct_map: Some(RawEtPctMap {
                    ranges: config
                        .et_map
                        .ranges()
                        .iter()
                        .map(|r| RawRange { x1: r.from, x2: r.to, y: r.drying_percent })
                        .collect(),
                }),
            }),
        }
    }
}

impl RawZone {
    fn into_zone(self, key: &str) -> Result<ZoneConfig, ConfigError> {
        let key_number: usize = key.parse().map_err(|_| ConfigError::InvalidNumericField {
            field: format!("ZoneConfigs.{key}"),
            reason: "zone key must be a non-negative integer".to_string(),
        })?;

        // An explicit Number must agree with the map key; the key is the
        // position the rest of the system indexes by.
        let number = match self.number {
            None => key_number,
            Some(n) if n == key_number as i64 => key_number,
            Some(n) => {
                return Err(ConfigError::InvalidNumericField {
                    field: format!("ZoneConfigs.{key}.Number"),
                    reason: format!("Number {n} does not match zone key {key_number}"),
                })
            }
        };

        let name = match self.name {
            Some(n) if !n.is_empty() => n,
            _ => {
                warn!("zone {number} has no name, using {MISSING_NAME}");
                MISSING_NAME.to_string()
            }
        };

        let zone = ZoneConfig {
            number,
            name,
            enabled: self.enabled.unwrap_or(false),
            gets_rain: self.gets_rain.unwrap_or(false),
            soil_name: self
                .soil
                .and_then(|s| s.name)
                .unwrap_or_else(|| MISSING_NAME.to_string()),
            min_vwc: self.min_vwc.unwrap_or(0.0),
            max_vwc: self.max_vwc.unwrap_or(100.0),
            run_time_multiplier: self.run_time_multiplier.unwrap_or(1.0),
            zone_et_rate: self.zone_et_rate.unwrap_or(10.0),
            depth_in: self.depth_in.unwrap_or(0.0),
        };

        zone.validate()?;
        Ok(zone)
    }
}

impl ZoneConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let field = |name: &str| format!("ZoneConfigs.{}.{name}", self.number);
        let range_check = |name: &str, value: f64, lo: f64, hi: f64| {
            if value < lo || value > hi {
                Err(ConfigError::InvalidNumericField {
                    field: field(name),
                    reason: format!("must be in the range {lo}-{hi}, have {value:.3}"),
                })
            } else {
                Ok(())
            }
        };

        range_check("MinVWC", self.min_vwc, 0.0, 100.0)?;
        range_check("MaxVWC", self.max_vwc, 0.0, 100.0)?;
        for (name, value) in [
            ("DepthIn", self.depth_in),
            ("ZoneETRate", self.zone_et_rate),
            ("RunTimeMultiplier", self.run_time_multiplier),
        ] {
            if value < 0.0 {
                return Err(ConfigError::InvalidNumericField {
                    field: field(name),
                    reason: format!("must not be negative, have {value:.3}"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
