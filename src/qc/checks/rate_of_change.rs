//! Rate of change test

use serde::Deserialize;

use super::{category, population_std};
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{FlagSeries, FlagValue, Variable};

/// Flags steep `|Δy / Δx|` steps (temperature per dbar by default).
///
/// The threshold widens with the series' own scatter:
/// `thresh + 2 · σ(y)`. A step with no change in `x` has no defined rate
/// and is skipped. The first and last observations are never flagged.
pub struct RateOfChange;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Params {
    thresh: f64,
    varx: String,
    vary: String,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            thresh: 2.0,
            varx: Variable::Pressure.to_string(),
            vary: Variable::Temperature.to_string(),
            fail_flag: FlagValue::Suspect,
            flag_name: "flag_roc".to_string(),
        }
    }
}

/// Indices reached by a step steeper than `threshold`.
pub fn rate_of_change_indices(x: &[f64], y: &[f64], threshold: f64) -> Vec<usize> {
    let n = x.len().min(y.len());
    if n < 3 {
        return Vec::new();
    }
    (1..n - 1)
        .filter(|&i| {
            let dx = x[i] - x[i - 1];
            let dy = y[i] - y[i - 1];
            dx != 0.0 && dx.is_finite() && dy.is_finite() && (dy / dx).abs() > threshold
        })
        .collect()
}

impl QcTest for RateOfChange {
    fn name(&self) -> &'static str {
        "rate_of_change_test"
    }

    fn description(&self) -> &'static str {
        "Temperature change per dbar above thresh + 2 sigma"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["thresh", "varx", "vary", "fail_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: Params = params.parse(self.name())?;
        let invalid = |message: String| QcError::InvalidParameter {
            test: self.name().to_string(),
            message,
        };
        let varx: Variable = p.varx.parse().map_err(invalid)?;
        let vary: Variable = p.vary.parse().map_err(invalid)?;

        let x = varx.column(ctx.observations);
        let y = vary.column(ctx.observations);
        let sd = population_std(&y);
        if ctx.len() > 1 && !sd.is_finite() {
            return Err(QcError::Numeric(format!("no finite {vary} values")));
        }
        let threshold = p.thresh + 2.0 * sd;

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::VALUE_BEHAVIOUR, ctx.len());
        for i in rate_of_change_indices(&x, &y, threshold) {
            flags.raise(i, p.fail_flag);
        }
        Ok(vec![flags])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qc::checks::fixtures;

    #[test]
    fn test_reference_series() {
        let obs = fixtures::standard();
        let meta = fixtures::metadata();
        let out = RateOfChange
            .apply(&fixtures::context(&obs, &meta), &TestParams::default())
            .unwrap();
        let mut expected = vec![FlagValue::Good; 23];
        expected[7] = FlagValue::Suspect;
        assert_eq!(out[0].values, expected);
    }

    #[test]
    fn test_zero_pressure_step_skipped() {
        let x = [1.0, 1.0, 2.0, 3.0];
        let y = [10.0, 20.0, 20.0, 20.0];
        assert!(rate_of_change_indices(&x, &y, 2.0).is_empty());
    }

    #[test]
    fn test_last_observation_never_flagged() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [10.0, 10.0, 10.0, 50.0];
        assert!(rate_of_change_indices(&x, &y, 2.0).is_empty());
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let obs = fixtures::standard();
        let meta = fixtures::metadata();
        let err = RateOfChange
            .apply(&fixtures::context(&obs, &meta), &fixtures::params("vary = \"SALINITY\""))
            .unwrap_err();
        assert!(matches!(err, QcError::InvalidParameter { .. }));
    }
}
