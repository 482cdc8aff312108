//! Speed-based tests: impossible speed and gear-type consistency

use serde::Deserialize;

use super::category;
use crate::geometry::{step_speeds, SpeedUnit};
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{FlagSeries, FlagValue, GearClass};

/// Mean of the defined speeds, or `None` when no step has a defined speed.
fn mean_speed(speeds: &[Option<f64>], absolute: bool) -> Option<f64> {
    let defined: Vec<f64> = speeds
        .iter()
        .flatten()
        .map(|s| if absolute { s.abs() } else { *s })
        .collect();
    if defined.is_empty() {
        return None;
    }
    Some(defined.iter().sum::<f64>() / defined.len() as f64)
}

// ============================================================================
// Impossible Speed
// ============================================================================

/// Flags fixes reached at a speed above `max_speed`.
///
/// When the mean absolute speed is exactly zero the gear never moved, and no
/// observation is flagged.
pub struct ImpossibleSpeed;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SpeedParams {
    max_speed: f64,
    unit: SpeedUnit,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for SpeedParams {
    fn default() -> Self {
        Self {
            max_speed: 100.0,
            unit: SpeedUnit::Knots,
            fail_flag: FlagValue::Bad,
            flag_name: "flag_speed".to_string(),
        }
    }
}

impl QcTest for ImpossibleSpeed {
    fn name(&self) -> &'static str {
        "impossible_speed"
    }

    fn description(&self) -> &'static str {
        "Inter-fix speed above the configured maximum"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["max_speed", "unit", "fail_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: SpeedParams = params.parse(self.name())?;
        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::POSITION, ctx.len());

        let speeds = step_speeds(ctx.observations, p.unit);
        match mean_speed(&speeds, true) {
            Some(mean) if mean != 0.0 => {}
            _ => return Ok(vec![flags]),
        }

        for (i, speed) in speeds.iter().enumerate() {
            if matches!(speed, Some(s) if *s > p.max_speed) {
                flags.raise(i, p.fail_flag);
            }
        }
        Ok(vec![flags])
    }
}

// ============================================================================
// Gear Type Consistency
// ============================================================================

/// Cross-checks the declared gear class against the observed mean speed.
pub struct GearTypeCheck;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GearParams {
    /// Mean speeds at or below this count as "not moving"
    stationary_speed: f64,
    unit: SpeedUnit,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for GearParams {
    fn default() -> Self {
        Self {
            stationary_speed: 0.0,
            unit: SpeedUnit::Knots,
            fail_flag: FlagValue::Suspect,
            flag_name: "flag_gear_type".to_string(),
        }
    }
}

impl QcTest for GearTypeCheck {
    fn name(&self) -> &'static str {
        "gear_type"
    }

    fn description(&self) -> &'static str {
        "Declared gear class disagrees with observed motion"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["stationary_speed", "unit", "fail_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: GearParams = params.parse(self.name())?;
        let gear = ctx.metadata.gear_class;
        if gear == GearClass::Unknown {
            return Err(QcError::MissingAttribute("gear_class".to_string()));
        }

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::GEAR, ctx.len());
        let Some(mean) = mean_speed(&step_speeds(ctx.observations, p.unit), false) else {
            return Ok(vec![flags]);
        };

        let moving = mean > p.stationary_speed;
        let mismatch = match gear {
            GearClass::Stationary => moving,
            GearClass::Mobile => !moving,
            GearClass::Unknown => false,
        };
        if mismatch {
            flags.raise_all(p.fail_flag);
        }
        Ok(vec![flags])
    }
}
