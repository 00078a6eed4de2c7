//! ET-based duration engine.
//!
//! Pure functions mapping (zone configuration, daily weather observation,
//! ET mapping table) to a recommended watering duration, plus the simple
//! linear volumetric-water-content model used for moisture tracking.
//!
//! Everything here is deterministic and side-effect free; the scheduler
//! decides what to do with the numbers.

use log::{debug, error};

use crate::config::{EtMappingTable, ZoneConfig};
use crate::error::DurationError;
use crate::history::WeatherObservation;

/// VWC percentage points added per inch of rainfall.
pub const PCT_PER_PRECIP_IN: f64 = 100.0;

/// Nominal calibration point: watering a nominal-depth zone for
/// [`NOMINAL_RUN_TIME_MIN`] minutes raises VWC by [`NOMINAL_VWC_INCREASE`].
const NOMINAL_DEPTH_IN: f64 = 8.0;
const NOMINAL_RUN_TIME_MIN: f64 = 10.0;
const NOMINAL_VWC_INCREASE: f64 = 20.0;

/// Seasonal scaling of the drying rate: plants transpire less in winter.
fn growth_factor(month: u32) -> f64 {
    match month {
        1 | 12 => 0.5,
        2 | 10 | 11 => 0.7,
        _ => 1.0,
    }
}

/// Recommended watering minutes for `zone` on the day of `observation`.
///
/// Base minutes are `depth * et_rate * (drying_pct / 100) * multiplier`;
/// rainfall (when the zone gets rain) subtracts a credit that scales the
/// same way, saturating at zero. Disabled zones always get 0.
pub fn compute_duration(
    zone: &ZoneConfig,
    observation: &WeatherObservation,
    map: &EtMappingTable,
) -> Result<f64, DurationError> {
    if !zone.enabled {
        return Ok(0.0);
    }

    let drying_pct = lookup_drying_pct(map, observation.avg_temp)?;

    let base =
        zone.depth_in * zone.zone_et_rate * (drying_pct / 100.0) * zone.run_time_multiplier;

    let minutes = if zone.gets_rain && observation.precipitation > 0.0 {
        let rain_credit = observation.precipitation * PCT_PER_PRECIP_IN / 100.0
            * zone.depth_in
            * zone.run_time_multiplier;
        (base - rain_credit).max(0.0)
    } else {
        base
    };

    debug!(
        "zone {} duration: pct={drying_pct:.1} base={base:.2} -> {minutes:.2} mins",
        zone.number
    );
    Ok(minutes)
}

/// Advance a zone's VWC estimate by one day of weather.
///
/// `remove = drying_pct(temp) * zone_et_rate * growth_factor(month)`,
/// `add = precip * PCT_PER_PRECIP_IN`; the result is clamped to
/// `[0, zone.max_vwc]`.
pub fn advance_vwc(
    current_vwc: f64,
    observation: &WeatherObservation,
    month: u32,
    zone: &ZoneConfig,
    map: &EtMappingTable,
) -> Result<f64, DurationError> {
    let drying_pct = lookup_drying_pct(map, observation.avg_temp)?;
    let remove = drying_pct * zone.zone_et_rate * growth_factor(month);
    let add = observation.precipitation * PCT_PER_PRECIP_IN;
    Ok((current_vwc + add - remove).clamp(0.0, zone.max_vwc))
}

/// Whole minutes of watering needed to raise VWC from `current` to
/// `target`, given the forecast rainfall. Fractions of a minute are
/// dropped; forecast rain can drive the requirement to zero.
pub fn refill_minutes(
    current_vwc: f64,
    target_vwc: f64,
    forecast_precip_in: f64,
    zone: &ZoneConfig,
) -> f64 {
    let precip_vwc = forecast_precip_in * PCT_PER_PRECIP_IN;
    let add_vwc = (target_vwc - current_vwc - precip_vwc).max(0.0);
    ((add_vwc / NOMINAL_VWC_INCREASE) * (zone.depth_in / NOMINAL_DEPTH_IN) * NOMINAL_RUN_TIME_MIN)
        .floor()
}

fn lookup_drying_pct(map: &EtMappingTable, temp: f64) -> Result<f64, DurationError> {
    map.drying_percent(temp).ok_or_else(|| {
        // Total coverage is a load-time invariant, so a hole here means the
        // mapping table is corrupt. Surface it loudly.
        error!("ET mapping table has no range for temperature {temp:.1}");
        DurationError::NoMatchingRange { temp }
    })
}
