//! Timing gap test

use serde::Deserialize;
use std::ops::Range;

use super::category;
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{FlagSeries, FlagValue, Observation};

/// Splits the series at long gaps and flags clusters with fewer than
/// `num_obs` readings. Tiny isolated clusters are usually the sensor
/// waking on contact rather than a real deployment.
pub struct TimingGap;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Params {
    max_gap_secs: i64,
    num_obs: usize,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_gap_secs: 3600,
            num_obs: 5,
            fail_flag: FlagValue::Bad,
            flag_name: "flag_timing_gap".to_string(),
        }
    }
}

/// Index ranges separated by gaps longer than `max_gap_secs`.
pub fn segments(observations: &[Observation], max_gap_secs: i64) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    if observations.is_empty() {
        return out;
    }
    let mut start = 0;
    for i in 1..observations.len() {
        let gap = (observations[i].timestamp - observations[i - 1].timestamp).num_seconds();
        if gap > max_gap_secs {
            out.push(start..i);
            start = i;
        }
    }
    out.push(start..observations.len());
    out
}

impl QcTest for TimingGap {
    fn name(&self) -> &'static str {
        "timing_gap_test"
    }

    fn description(&self) -> &'static str {
        "Small clusters isolated by long time gaps"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["max_gap_secs", "num_obs", "fail_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: Params = params.parse(self.name())?;
        if p.max_gap_secs <= 0 {
            return Err(QcError::InvalidParameter {
                test: self.name().to_string(),
                message: format!("max_gap_secs must be positive, got {}", p.max_gap_secs),
            });
        }

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::TIMING, ctx.len());
        let clusters = segments(ctx.observations, p.max_gap_secs);
        if clusters.len() > 1 {
            for cluster in clusters.into_iter().filter(|c| c.len() < p.num_obs) {
                flags.raise_range(cluster, p.fail_flag);
            }
        }
        Ok(vec![flags])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qc::checks::fixtures;
    use chrono::Duration;

    fn at_minutes(minutes: &[i64]) -> Vec<Observation> {
        minutes
            .iter()
            .map(|&m| Observation::new(fixtures::t0() + Duration::minutes(m), -41.0, 173.0, 1.0, 12.0))
            .collect()
    }

    #[test]
    fn test_isolated_cluster_flagged() {
        // Two readings, a three hour gap, then a full deployment
        let obs = at_minutes(&[0, 1, 181, 182, 183, 184, 185, 186]);
        let meta = fixtures::metadata();
        let out = TimingGap
            .apply(&fixtures::context(&obs, &meta), &TestParams::default())
            .unwrap();
        assert_eq!(out[0].flagged_indices(), vec![0, 1]);
        assert_eq!(out[0].values[0], FlagValue::Bad);
    }

    #[test]
    fn test_single_short_series_not_flagged() {
        let obs = at_minutes(&[0, 1, 2]);
        let meta = fixtures::metadata();
        let out = TimingGap
            .apply(&fixtures::context(&obs, &meta), &TestParams::default())
            .unwrap();
        assert!(out[0].flagged_indices().is_empty());
    }

    #[test]
    fn test_segments_split_on_gap() {
        let obs = at_minutes(&[0, 1, 100, 101, 300]);
        assert_eq!(segments(&obs, 3600), vec![0..2, 2..4, 4..5]);
        assert_eq!(segments(&obs, 60 * 60 * 24), vec![0..5]);
    }
}
