//! Quality flags: ordinal severities and named per-test flag columns

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal quality severity. Higher is always worse.
///
/// Serialized as its integer value (1-4); any other integer is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FlagValue {
    #[default]
    Good = 1,
    ProbablyGood = 2,
    Suspect = 3,
    Bad = 4,
}

impl FlagValue {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FlagValue {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FlagValue::Good),
            2 => Ok(FlagValue::ProbablyGood),
            3 => Ok(FlagValue::Suspect),
            4 => Ok(FlagValue::Bad),
            other => Err(format!("flag value must be 1-4, got {other}")),
        }
    }
}

impl From<FlagValue> for u8 {
    fn from(flag: FlagValue) -> Self {
        flag as u8
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Category label that excludes a series from per-category aggregation.
pub const NO_CATEGORY: &str = "none";

/// One named column of flags produced by a single test invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagSeries {
    /// Output column name, e.g. `flag_spike_temp`
    pub name: String,
    /// Registry name of the test that produced it
    pub test: String,
    /// Logical group for sub-aggregation (`position`, `timing`, ...)
    pub category: String,
    pub values: Vec<FlagValue>,
}

impl FlagSeries {
    /// A series of `len` observations, all good.
    pub fn good(name: impl Into<String>, test: impl Into<String>, category: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            test: test.into(),
            category: category.into(),
            values: vec![FlagValue::Good; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raise the flag at `index` to `flag` (never lowers it).
    pub fn raise(&mut self, index: usize, flag: FlagValue) {
        if let Some(v) = self.values.get_mut(index) {
            if flag > *v {
                *v = flag;
            }
        }
    }

    /// Raise every flag in `range`.
    pub fn raise_range(&mut self, range: std::ops::Range<usize>, flag: FlagValue) {
        for i in range {
            self.raise(i, flag);
        }
    }

    /// Raise every flag in the series.
    pub fn raise_all(&mut self, flag: FlagValue) {
        self.raise_range(0..self.values.len(), flag);
    }

    /// Whether this series takes part in category aggregation.
    pub fn is_categorized(&self) -> bool {
        !self.category.is_empty() && !self.category.eq_ignore_ascii_case(NO_CATEGORY)
    }

    /// Indices flagged worse than `Good`.
    pub fn flagged_indices(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > FlagValue::Good)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Count how many observations carry each flag value. Index 0 is flag 1.
pub fn flag_counts(values: &[FlagValue]) -> [usize; 4] {
    let mut counts = [0usize; 4];
    for v in values {
        counts[(v.as_u8() - 1) as usize] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_ordering_is_severity() {
        assert!(FlagValue::Bad > FlagValue::Suspect);
        assert!(FlagValue::Suspect > FlagValue::ProbablyGood);
        assert!(FlagValue::ProbablyGood > FlagValue::Good);
        assert_eq!(FlagValue::default(), FlagValue::Good);
    }

    #[test]
    fn test_flag_rejects_out_of_range() {
        assert!(FlagValue::try_from(0).is_err());
        assert!(FlagValue::try_from(5).is_err());
        assert_eq!(FlagValue::try_from(3), Ok(FlagValue::Suspect));
        let parsed: Result<FlagValue, _> = serde_json::from_str("9");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_raise_never_lowers() {
        let mut s = FlagSeries::good("flag_x", "x", "timing", 3);
        s.raise(1, FlagValue::Bad);
        s.raise(1, FlagValue::Suspect);
        s.raise(7, FlagValue::Bad);
        assert_eq!(s.values, vec![FlagValue::Good, FlagValue::Bad, FlagValue::Good]);
        assert_eq!(s.flagged_indices(), vec![1]);
    }

    #[test]
    fn test_flag_counts() {
        let counts = flag_counts(&[FlagValue::Good, FlagValue::Bad, FlagValue::Bad]);
        assert_eq!(counts, [1, 0, 0, 2]);
    }

    #[test]
    fn test_none_category_not_aggregated() {
        let s = FlagSeries::good("flag_x", "x", "None", 1);
        assert!(!s.is_categorized());
    }
}
