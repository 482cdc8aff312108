//! Second-pass sanity checks on the inferred position
//!
//! Both tests read attributes the position estimator writes to the
//! deployment metadata, so they only make sense after position inference.

use serde::Deserialize;

use super::category;
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{attrs, FlagSeries, FlagValue, GearClass};

// ============================================================================
// Stationary Position Check
// ============================================================================

/// Verifies that the first and last good fixes were taken near the surface.
///
/// Stationary gear gets the stricter limit: its single position is an
/// average of surface fixes, so a deep "good" fix means the averaging
/// assumption failed.
pub struct StationaryPositionCheck;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StationaryParams {
    stationary_max_pressure: f64,
    stationary_flag: FlagValue,
    mobile_max_pressure: f64,
    mobile_flag: FlagValue,
    flag_name: String,
}

impl Default for StationaryParams {
    fn default() -> Self {
        Self {
            stationary_max_pressure: 5.0,
            stationary_flag: FlagValue::Suspect,
            mobile_max_pressure: 10.0,
            mobile_flag: FlagValue::ProbablyGood,
            flag_name: "flag_stationary_position".to_string(),
        }
    }
}

impl QcTest for StationaryPositionCheck {
    fn name(&self) -> &'static str {
        "stationary_position_check"
    }

    fn description(&self) -> &'static str {
        "First/last good fixes deeper than the surface limit for the gear class"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &[
            "stationary_max_pressure",
            "stationary_flag",
            "mobile_max_pressure",
            "mobile_flag",
            "flag_name",
        ]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: StationaryParams = params.parse(self.name())?;
        let (limit, fail_flag) = match ctx.metadata.gear_class {
            GearClass::Stationary => (p.stationary_max_pressure, p.stationary_flag),
            GearClass::Mobile => (p.mobile_max_pressure, p.mobile_flag),
            GearClass::Unknown => return Err(QcError::MissingAttribute("gear_class".to_string())),
        };

        let first = ctx
            .metadata
            .number(attrs::FIRST_GOOD_PRESSURE)
            .ok_or_else(|| QcError::MissingAttribute(attrs::FIRST_GOOD_PRESSURE.to_string()))?;
        let last = ctx
            .metadata
            .number(attrs::LAST_GOOD_PRESSURE)
            .ok_or_else(|| QcError::MissingAttribute(attrs::LAST_GOOD_PRESSURE.to_string()))?;

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::POSITION, ctx.len());
        if first > limit || last > limit {
            flags.raise_all(fail_flag);
        }
        Ok(vec![flags])
    }
}

// ============================================================================
// Start / End Displacement
// ============================================================================

/// Grades the distance between the first and last good fixes of stationary
/// gear. A large displacement means the gear (or the vessel recording it)
/// moved, and the averaged position is less trustworthy.
pub struct StartEndDistCheck;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DisplacementParams {
    /// metres: up to `cutoffs[0]` is good, up to `cutoffs[1]` probably good, beyond suspect
    cutoffs: [f64; 2],
    missing_flag: FlagValue,
    flag_name: String,
}

impl Default for DisplacementParams {
    fn default() -> Self {
        Self {
            cutoffs: [500.0, 2000.0],
            missing_flag: FlagValue::ProbablyGood,
            flag_name: "flag_start_end_dist".to_string(),
        }
    }
}

/// Severity for a start/end distance in metres.
pub fn displacement_flag(distance_m: Option<f64>, cutoffs: [f64; 2], missing: FlagValue) -> FlagValue {
    match distance_m {
        Some(d) if d.is_finite() => {
            if d <= cutoffs[0] {
                FlagValue::Good
            } else if d <= cutoffs[1] {
                FlagValue::ProbablyGood
            } else {
                FlagValue::Suspect
            }
        }
        _ => missing,
    }
}

impl QcTest for StartEndDistCheck {
    fn name(&self) -> &'static str {
        "start_end_dist_check"
    }

    fn description(&self) -> &'static str {
        "Displacement between first and last good fixes of stationary gear"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["cutoffs", "missing_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: DisplacementParams = params.parse(self.name())?;
        if p.cutoffs[0] > p.cutoffs[1] {
            return Err(QcError::InvalidParameter {
                test: self.name().to_string(),
                message: format!("cutoffs must be ascending, got {:?}", p.cutoffs),
            });
        }

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::POSITION, ctx.len());
        if ctx.metadata.gear_class == GearClass::Stationary {
            let distance = ctx.metadata.number(attrs::START_END_DIST_M);
            flags.raise_all(displacement_flag(distance, p.cutoffs, p.missing_flag));
        }
        Ok(vec![flags])
    }
}
