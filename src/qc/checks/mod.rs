//! QC test catalog
//!
//! One file per test family. Every test deserialises its own parameter
//! struct from the `[tests.<name>]` table on each call; keys left out take
//! the defaults listed on the struct.
//!
//! | Test | Columns | Default fail flag |
//! |---|---|---|
//! | `impossible_date` | `flag_date` | 4 (3 before `min_date`) |
//! | `impossible_location` | `flag_location` | 4 |
//! | `remove_ref_location` | `flag_ref_loc` | 4 |
//! | `position_on_land` | `flag_land` | 3 |
//! | `impossible_speed` | `flag_speed` | 4 |
//! | `gear_type` | `flag_gear_type` | 3 |
//! | `global_range` | `flag_global_range_{pres,temp}` | 4 |
//! | `climatology_test` (opt-in) | `flag_clima` | 3 |
//! | `spike` | `flag_spike_{temp,pres}` | 4 |
//! | `stuck_value` | `flag_stuck_value_{temp,pres}` | 2 |
//! | `rate_of_change_test` | `flag_roc` | 3 |
//! | `timing_gap_test` | `flag_timing_gap` | 4 |
//! | `temperature_drift` | `flag_temp_drift` | 3 |
//! | `stationary_position_check` | `flag_stationary_position` | 3 / 2 |
//! | `start_end_dist_check` | `flag_start_end_dist` | 2 / 3 |

pub mod date;
pub mod drift;
pub mod location;
pub mod position_checks;
pub mod range;
pub mod rate_of_change;
pub mod speed;
pub mod spike;
pub mod stuck;
pub mod timing;

pub use date::ImpossibleDate;
pub use drift::TemperatureDrift;
pub use location::{ImpossibleLocation, PositionOnLand, RemoveRefLocation};
pub use position_checks::{StartEndDistCheck, StationaryPositionCheck};
pub use range::{ClimatologyTest, GlobalRange};
pub use rate_of_change::RateOfChange;
pub use speed::{GearTypeCheck, ImpossibleSpeed};
pub use spike::SpikeTest;
pub use stuck::StuckValue;
pub use timing::TimingGap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use super::{QcError, QcTest};
use crate::types::Variable;

/// Category labels used for per-category aggregation.
pub mod category {
    pub const POSITION: &str = "position";
    pub const TIMING: &str = "timing";
    pub const VALUE_RANGE: &str = "value_range";
    pub const VALUE_BEHAVIOUR: &str = "value_behaviour";
    pub const GEAR: &str = "gear";
}

/// Every test in the catalog.
pub fn default_tests() -> Vec<Box<dyn QcTest>> {
    vec![
        Box::new(ImpossibleDate),
        Box::new(ImpossibleLocation),
        Box::new(RemoveRefLocation),
        Box::new(PositionOnLand),
        Box::new(ImpossibleSpeed),
        Box::new(GearTypeCheck),
        Box::new(GlobalRange),
        Box::new(ClimatologyTest),
        Box::new(SpikeTest),
        Box::new(StuckValue),
        Box::new(RateOfChange),
        Box::new(TimingGap),
        Box::new(TemperatureDrift),
        Box::new(StationaryPositionCheck),
        Box::new(StartEndDistCheck),
    ]
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Population standard deviation of the finite values (NaN when there are none).
pub(crate) fn population_std(values: &[f64]) -> f64 {
    values
        .iter()
        .filter(|v| v.is_finite())
        .population_std_dev()
}

/// Mean of the finite values (NaN when there are none).
pub(crate) fn finite_mean(values: &[f64]) -> f64 {
    values.iter().filter(|v| v.is_finite()).mean()
}

/// Short column suffix for a variable (`flag_spike_temp`).
pub(crate) fn short_name(variable: Variable) -> &'static str {
    match variable {
        Variable::Pressure => "pres",
        Variable::Temperature => "temp",
        Variable::Latitude => "lat",
        Variable::Longitude => "lon",
    }
}

/// Output column for a per-variable test, honouring a configured override.
pub(crate) fn variable_flag_name(
    prefix: &str,
    variable: Variable,
    overrides: &BTreeMap<Variable, String>,
) -> String {
    overrides
        .get(&variable)
        .cloned()
        .unwrap_or_else(|| format!("{prefix}_{}", short_name(variable)))
}

/// Re-key a configured `{VARIABLE = value}` table by [`Variable`].
///
/// Keys are matched case-insensitively; anything else is a parameter error.
pub(crate) fn variable_map<T>(
    test: &str,
    raw: BTreeMap<String, T>,
) -> Result<BTreeMap<Variable, T>, QcError> {
    raw.into_iter()
        .map(|(key, value)| {
            key.parse::<Variable>()
                .map(|v| (v, value))
                .map_err(|message| QcError::InvalidParameter {
                    test: test.to_string(),
                    message,
                })
        })
        .collect()
}

/// Parse a configured date: RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC) or `YYYY-MM-DD`.
pub(crate) fn parse_time(test: &str, raw: &str) -> Result<DateTime<Utc>, QcError> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(t.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| QcError::InvalidParameter {
            test: test.to_string(),
            message: format!("cannot parse date '{raw}'"),
        })
}
