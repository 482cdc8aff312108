//! Date range test

use serde::Deserialize;

use super::{category, parse_time};
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{attrs, FlagSeries, FlagValue};

/// Flags readings stamped in the future (relative to download) or before a
/// plausible minimum date (sensor clock reset).
pub struct ImpossibleDate;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Params {
    min_date: String,
    /// Overrides the download time / run time upper bound
    max_date: Option<String>,
    fail_flag: FlagValue,
    early_flag: FlagValue,
    flag_name: String,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            min_date: "2010-01-01".to_string(),
            max_date: None,
            fail_flag: FlagValue::Bad,
            early_flag: FlagValue::Suspect,
            flag_name: "flag_date".to_string(),
        }
    }
}

impl QcTest for ImpossibleDate {
    fn name(&self) -> &'static str {
        "impossible_date"
    }

    fn description(&self) -> &'static str {
        "Timestamps at or after download time, or before the minimum plausible date"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["min_date", "max_date", "fail_flag", "early_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: Params = params.parse(self.name())?;
        let min = parse_time(self.name(), &p.min_date)?;
        let max = match &p.max_date {
            Some(raw) => parse_time(self.name(), raw)?,
            None => ctx
                .metadata
                .time(attrs::DOWNLOAD_TIME)
                .unwrap_or(ctx.run_time),
        };

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::TIMING, ctx.len());
        for (i, obs) in ctx.observations.iter().enumerate() {
            if obs.timestamp >= max {
                flags.raise(i, p.fail_flag);
            } else if obs.timestamp < min {
                flags.raise(i, p.early_flag);
            }
        }
        Ok(vec![flags])
    }
}
