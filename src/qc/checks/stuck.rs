//! Stuck value test
//!
//! The window is a fixed number of observations, not a duration: doubling
//! the sampling rate halves the time a sensor must sit still before it is
//! flagged. Tune `rep_num` together with the logging interval.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::{category, variable_flag_name, variable_map};
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{FlagSeries, FlagValue, Variable};

/// Flags runs of readings that stay within a tolerance band.
pub struct StuckValue;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Params {
    /// Variable → tolerance
    variables: BTreeMap<String, f64>,
    flag_names: BTreeMap<String, String>,
    rep_num: usize,
    fail_flag: FlagValue,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            variables: BTreeMap::from([
                (Variable::Temperature.to_string(), 0.05),
                (Variable::Pressure.to_string(), 0.01),
            ]),
            flag_names: BTreeMap::new(),
            rep_num: 5,
            fail_flag: FlagValue::ProbablyGood,
        }
    }
}

/// Indices covered by a stuck window.
///
/// For each `i >= rep_num`, when every value in `x[i - rep_num .. i]` lies
/// strictly within `tolerance` of `x[i]`, that window is stuck. The reading
/// that confirms the window is not itself marked.
pub fn stuck_indices(values: &[f64], rep_num: usize, tolerance: f64) -> Vec<usize> {
    let mut stuck = vec![false; values.len()];
    for i in rep_num..values.len() {
        let x = values[i];
        if values[i - rep_num..i].iter().all(|v| (v - x).abs() < tolerance) {
            stuck[i - rep_num..i].iter_mut().for_each(|s| *s = true);
        }
    }
    stuck
        .iter()
        .enumerate()
        .filter(|(_, s)| **s)
        .map(|(i, _)| i)
        .collect()
}

impl QcTest for StuckValue {
    fn name(&self) -> &'static str {
        "stuck_value"
    }

    fn description(&self) -> &'static str {
        "Runs of rep_num readings within a tolerance band"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["variables", "flag_names", "rep_num", "fail_flag"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: Params = params.parse(self.name())?;
        if p.rep_num == 0 {
            return Err(QcError::InvalidParameter {
                test: self.name().to_string(),
                message: "rep_num must be at least 1".to_string(),
            });
        }
        let tolerances = variable_map(self.name(), p.variables)?;
        let names = variable_map(self.name(), p.flag_names)?;

        let mut out = Vec::with_capacity(tolerances.len());
        for (variable, tolerance) in tolerances {
            let values = variable.column(ctx.observations);
            let mut flags = FlagSeries::good(
                variable_flag_name("flag_stuck_value", variable, &names),
                self.name(),
                category::VALUE_BEHAVIOUR,
                ctx.len(),
            );
            for i in stuck_indices(&values, p.rep_num, tolerance) {
                flags.raise(i, p.fail_flag);
            }
            out.push(flags);
        }
        Ok(out)
    }
}
