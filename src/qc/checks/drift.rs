//! Depth-binned temperature drift test
//!
//! Bin edges and thresholds are plain configuration data:
//!
//! ```toml
//! [tests.temperature_drift]
//! min_obs = 3
//! bins = [
//!     { min_pressure = 0.0, max_pressure = 10.0, max_std = 4.0, max_spread = 12.0 },
//!     { min_pressure = 10.0, max_pressure = 100.0, max_std = 3.5, max_spread = 10.0 },
//! ]
//! ```

use serde::Deserialize;

use super::{category, population_std};
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{FlagSeries, FlagValue};

/// One pressure bin, `[min_pressure, max_pressure)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriftBin {
    pub min_pressure: f64,
    pub max_pressure: f64,
    pub max_std: f64,
    pub max_spread: f64,
}

impl DriftBin {
    fn new(min_pressure: f64, max_pressure: f64, max_std: f64, max_spread: f64) -> Self {
        Self {
            min_pressure,
            max_pressure,
            max_std,
            max_spread,
        }
    }

    fn contains(&self, pressure: f64) -> bool {
        pressure >= self.min_pressure && pressure < self.max_pressure
    }
}

pub fn default_bins() -> Vec<DriftBin> {
    vec![
        DriftBin::new(0.0, 10.0, 4.0, 12.0),
        DriftBin::new(10.0, 100.0, 3.5, 10.0),
        DriftBin::new(100.0, 500.0, 2.0, 6.0),
        DriftBin::new(500.0, 2000.0, 1.0, 3.0),
    ]
}

/// Flags every reading in a bin whose temperature scatter exceeds both the
/// bin's standard deviation and spread limits. Excess scatter at a fixed
/// depth points to a damaged sensor.
pub struct TemperatureDrift;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Params {
    bins: Vec<DriftBin>,
    /// Bins with fewer readings are not judged
    min_obs: usize,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            min_obs: 3,
            fail_flag: FlagValue::Suspect,
            flag_name: "flag_temp_drift".to_string(),
        }
    }
}

impl QcTest for TemperatureDrift {
    fn name(&self) -> &'static str {
        "temperature_drift"
    }

    fn description(&self) -> &'static str {
        "Excess temperature scatter within fixed pressure bins"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["bins", "min_obs", "fail_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: Params = params.parse(self.name())?;
        if let Some(bad) = p.bins.iter().find(|b| b.min_pressure >= b.max_pressure) {
            return Err(QcError::InvalidParameter {
                test: self.name().to_string(),
                message: format!(
                    "bin [{}, {}) is empty",
                    bad.min_pressure, bad.max_pressure
                ),
            });
        }

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::VALUE_BEHAVIOUR, ctx.len());
        for bin in &p.bins {
            let members: Vec<usize> = ctx
                .observations
                .iter()
                .enumerate()
                .filter(|(_, o)| bin.contains(o.pressure) && o.temperature.is_finite())
                .map(|(i, _)| i)
                .collect();
            if members.len() < p.min_obs.max(1) {
                continue;
            }

            let temps: Vec<f64> = members
                .iter()
                .map(|&i| ctx.observations[i].temperature)
                .collect();
            let std = population_std(&temps);
            let max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = temps.iter().copied().fold(f64::INFINITY, f64::min);
            let spread = max - min;
            if std > bin.max_std && spread > bin.max_spread {
                for &i in &members {
                    flags.raise(i, p.fail_flag);
                }
            }
        }
        Ok(vec![flags])
    }
}
