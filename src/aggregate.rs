//! Flag aggregation: worst-case reduction of per-test flag columns
//!
//! The overall flag for an observation is the maximum over every series;
//! category flags are the maximum over the series sharing a category label.
//! Aggregation always starts from scratch, so running it twice over the
//! same series (in any order) gives the same answer.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{flag_counts, FlagSeries, FlagValue};

/// Column name of the overall flag in outputs.
pub const OVERALL_FLAG: &str = "QC_FLAG";

/// Overall and per-category flags for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateFlags {
    pub overall: Vec<FlagValue>,
    pub categories: BTreeMap<String, Vec<FlagValue>>,
}

impl AggregateFlags {
    pub fn len(&self) -> usize {
        self.overall.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overall.is_empty()
    }

    /// True when every observation is flagged bad (and there is at least one).
    pub fn all_bad(&self) -> bool {
        !self.overall.is_empty() && self.overall.iter().all(|f| *f == FlagValue::Bad)
    }

    /// Counts of overall flags 1-4.
    pub fn counts(&self) -> [usize; 4] {
        flag_counts(&self.overall)
    }
}

/// Reduces flag series to aggregate flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagAggregator;

impl FlagAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate `series` over `len` observations.
    ///
    /// Observations no series covers stay good. Series whose category is
    /// `none` (or empty) count toward the overall flag only.
    pub fn aggregate(&self, len: usize, series: &[FlagSeries]) -> AggregateFlags {
        let mut overall = vec![FlagValue::Good; len];
        let mut categories: BTreeMap<String, Vec<FlagValue>> = BTreeMap::new();

        for s in series {
            merge_max(&mut overall, &s.values);
            if s.is_categorized() {
                let column = categories
                    .entry(s.category.clone())
                    .or_insert_with(|| vec![FlagValue::Good; len]);
                merge_max(column, &s.values);
            }
        }

        AggregateFlags {
            overall,
            categories,
        }
    }
}

fn merge_max(into: &mut [FlagValue], from: &[FlagValue]) {
    for (acc, v) in into.iter_mut().zip(from) {
        if *v > *acc {
            *acc = *v;
        }
    }
}
