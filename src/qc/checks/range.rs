//! Value range tests: global range and (opt-in) seasonal climatology

use serde::Deserialize;
use std::collections::BTreeMap;

use super::{category, variable_flag_name, variable_map};
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{FlagSeries, FlagValue, Variable};

/// Inclusive bounds for one variable.
#[derive(Debug, Clone, Deserialize)]
struct Bounds {
    min: f64,
    max: f64,
    flag_name: Option<String>,
}

impl Bounds {
    fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            flag_name: None,
        }
    }
}

fn range_flags(
    test: &'static str,
    prefix: &str,
    ctx: &QcContext<'_>,
    ranges: BTreeMap<String, Bounds>,
    fail_flag: FlagValue,
    category: &str,
) -> Result<Vec<FlagSeries>, QcError> {
    let ranges = variable_map(test, ranges)?;
    let mut out = Vec::with_capacity(ranges.len());
    for (variable, bounds) in ranges {
        if bounds.min > bounds.max {
            return Err(QcError::InvalidParameter {
                test: test.to_string(),
                message: format!("{variable}: min {} exceeds max {}", bounds.min, bounds.max),
            });
        }
        let name = bounds
            .flag_name
            .unwrap_or_else(|| variable_flag_name(prefix, variable, &BTreeMap::new()));
        let mut flags = FlagSeries::good(name, test, category, ctx.len());
        for (i, obs) in ctx.observations.iter().enumerate() {
            let v = obs.value(variable);
            if v < bounds.min || v > bounds.max {
                flags.raise(i, fail_flag);
            }
        }
        out.push(flags);
    }
    Ok(out)
}

// ============================================================================
// Global Range
// ============================================================================

/// Flags values outside broad physical limits, one column per variable.
pub struct GlobalRange;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GlobalParams {
    ranges: BTreeMap<String, Bounds>,
    fail_flag: FlagValue,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            ranges: BTreeMap::from([
                (Variable::Pressure.to_string(), Bounds::new(0.0, 2000.0)),
                (Variable::Temperature.to_string(), Bounds::new(-2.0, 35.0)),
            ]),
            fail_flag: FlagValue::Bad,
        }
    }
}

impl QcTest for GlobalRange {
    fn name(&self) -> &'static str {
        "global_range"
    }

    fn description(&self) -> &'static str {
        "Pressure and temperature outside physical limits"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["ranges", "fail_flag"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: GlobalParams = params.parse(self.name())?;
        range_flags(
            self.name(),
            "flag_global_range",
            ctx,
            p.ranges,
            p.fail_flag,
            category::VALUE_RANGE,
        )
    }
}

// ============================================================================
// Climatology
// ============================================================================

/// Seasonal temperature bounds. Without a regional climatology the bounds
/// are static, so this test is registered but not in the default passes.
pub struct ClimatologyTest;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ClimatologyParams {
    min: f64,
    max: f64,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for ClimatologyParams {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 25.0,
            fail_flag: FlagValue::Suspect,
            flag_name: "flag_clima".to_string(),
        }
    }
}

impl QcTest for ClimatologyTest {
    fn name(&self) -> &'static str {
        "climatology_test"
    }

    fn description(&self) -> &'static str {
        "Temperature outside seasonal bounds (opt-in)"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["min", "max", "fail_flag", "flag_name"]
    }

    fn opt_in(&self) -> bool {
        true
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: ClimatologyParams = params.parse(self.name())?;
        let ranges = BTreeMap::from([(
            Variable::Temperature.to_string(),
            Bounds {
                min: p.min,
                max: p.max,
                flag_name: Some(p.flag_name),
            },
        )]);
        range_flags(self.name(), "flag_clima", ctx, ranges, p.fail_flag, category::VALUE_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qc::checks::fixtures;

    #[test]
    fn test_global_range_columns_per_variable() {
        let obs = fixtures::series(&[-3.0, 10.0, 35.0, 36.0], &[-1.0, 0.0, 2000.0, 10.0]);
        let meta = fixtures::metadata();
        let out = GlobalRange
            .apply(&fixtures::context(&obs, &meta), &TestParams::default())
            .unwrap();
        assert_eq!(out.len(), 2);
        let pres = out.iter().find(|s| s.name == "flag_global_range_pres").unwrap();
        let temp = out.iter().find(|s| s.name == "flag_global_range_temp").unwrap();
        assert_eq!(pres.flagged_indices(), vec![0]);
        assert_eq!(temp.flagged_indices(), vec![0, 3]);
    }

    #[test]
    fn test_global_range_custom_table() {
        let obs = fixtures::series(&[5.0, 15.0], &[1.0, 1.0]);
        let meta = fixtures::metadata();
        let params = fixtures::params(
            "ranges = { TEMPERATURE = { min = 0.0, max = 10.0, flag_name = \"flag_t\" } }",
        );
        let out = GlobalRange.apply(&fixtures::context(&obs, &meta), &params).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "flag_t");
        assert_eq!(out[0].values, vec![FlagValue::Good, FlagValue::Bad]);
    }

    #[test]
    fn test_global_range_unknown_variable_rejected() {
        let obs = fixtures::standard();
        let meta = fixtures::metadata();
        let params = fixtures::params("ranges = { SALINITY = { min = 0.0, max = 40.0 } }");
        let err = GlobalRange.apply(&fixtures::context(&obs, &meta), &params).unwrap_err();
        assert!(matches!(err, QcError::InvalidParameter { .. }));
    }

    #[test]
    fn test_climatology_flags_warm_water() {
        let obs = fixtures::series(&[24.0, 26.0, -0.5], &[1.0, 1.0, 1.0]);
        let meta = fixtures::metadata();
        let out = ClimatologyTest
            .apply(&fixtures::context(&obs, &meta), &TestParams::default())
            .unwrap();
        assert_eq!(
            out[0].values,
            vec![FlagValue::Good, FlagValue::Suspect, FlagValue::Suspect]
        );
    }
}
