//! Spike test

use serde::Deserialize;
use std::collections::BTreeMap;

use super::{category, population_std, variable_flag_name, variable_map};
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{FlagSeries, FlagValue, Variable};

/// Flags isolated excursions: `|x[i] - (x[i-1] + x[i+1]) / 2|` above
/// `k · σ(x)`. The first and last observations have no neighbour on one
/// side and stay good.
pub struct SpikeTest;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Params {
    /// Variable → number of standard deviations
    variables: BTreeMap<String, f64>,
    flag_names: BTreeMap<String, String>,
    fail_flag: FlagValue,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            variables: BTreeMap::from([
                (Variable::Temperature.to_string(), 3.0),
                (Variable::Pressure.to_string(), 2.0),
            ]),
            flag_names: BTreeMap::new(),
            fail_flag: FlagValue::Bad,
        }
    }
}

/// Indices whose second-difference magnitude exceeds `threshold`.
pub fn spike_indices(values: &[f64], threshold: f64) -> Vec<usize> {
    if values.len() < 3 || !threshold.is_finite() {
        return Vec::new();
    }
    (1..values.len() - 1)
        .filter(|&i| {
            let (prev, x, next) = (values[i - 1], values[i], values[i + 1]);
            prev.is_finite()
                && x.is_finite()
                && next.is_finite()
                && (x - (prev + next) / 2.0).abs() > threshold
        })
        .collect()
}

impl QcTest for SpikeTest {
    fn name(&self) -> &'static str {
        "spike"
    }

    fn description(&self) -> &'static str {
        "Second-difference spikes above k standard deviations"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["variables", "flag_names", "fail_flag"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: Params = params.parse(self.name())?;
        let factors = variable_map(self.name(), p.variables)?;
        let names = variable_map(self.name(), p.flag_names)?;

        let mut out = Vec::with_capacity(factors.len());
        for (variable, k) in factors {
            if !(k.is_finite() && k > 0.0) {
                return Err(QcError::InvalidParameter {
                    test: self.name().to_string(),
                    message: format!("{variable}: k must be positive, got {k}"),
                });
            }
            let values = variable.column(ctx.observations);
            let threshold = k * population_std(&values);

            let mut flags = FlagSeries::good(
                variable_flag_name("flag_spike", variable, &names),
                self.name(),
                category::VALUE_BEHAVIOUR,
                ctx.len(),
            );
            for i in spike_indices(&values, threshold) {
                flags.raise(i, p.fail_flag);
            }
            out.push(flags);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qc::checks::fixtures;

    #[test]
    fn test_temperature_outlier_only() {
        let obs = fixtures::standard();
        let meta = fixtures::metadata();
        let out = SpikeTest
            .apply(&fixtures::context(&obs, &meta), &TestParams::default())
            .unwrap();
        let temp = out.iter().find(|s| s.name == "flag_spike_temp").unwrap();
        let mut expected = vec![FlagValue::Good; 23];
        expected[6] = FlagValue::Bad;
        assert_eq!(temp.values, expected);
    }

    #[test]
    fn test_pressure_dropout() {
        let obs = fixtures::standard();
        let meta = fixtures::metadata();
        let out = SpikeTest
            .apply(&fixtures::context(&obs, &meta), &TestParams::default())
            .unwrap();
        let pres = out.iter().find(|s| s.name == "flag_spike_pres").unwrap();
        assert_eq!(pres.flagged_indices(), vec![16]);
    }

    #[test]
    fn test_edges_never_flagged() {
        let values = [100.0, 0.0, 0.0, 0.0, 100.0];
        assert!(spike_indices(&values, 1.0).is_empty());
        assert!(spike_indices(&[1.0, 50.0], 0.1).is_empty());
    }

    #[test]
    fn test_nan_neighbours_skipped() {
        let values = [1.0, f64::NAN, 1.0, 30.0, 1.0];
        assert_eq!(spike_indices(&values, 5.0), vec![3]);
    }

    #[test]
    fn test_flag_name_override() {
        let obs = fixtures::standard();
        let meta = fixtures::metadata();
        let params = fixtures::params(
            "variables = { TEMPERATURE = 3.0 }\nflag_names = { TEMPERATURE = \"flag_spike\" }\nfail_flag = 3",
        );
        let out = SpikeTest.apply(&fixtures::context(&obs, &meta), &params).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "flag_spike");
        assert_eq!(out[0].values[6], FlagValue::Suspect);
    }
}
