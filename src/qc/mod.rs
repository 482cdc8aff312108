//! QC test contract and registry
//!
//! Every quality test implements [`QcTest`]: a pure function of the
//! observation series, the deployment metadata and an explicit parameter
//! table, returning one or more named [`FlagSeries`]. Tests are looked up by
//! name in a [`TestRegistry`] and run in caller-specified order.
//!
//! ## Failure model
//!
//! A test that returns an error (or panics) is recorded as "not applied" and
//! the remaining tests still run. Nothing a single test does can abort the
//! deployment.

pub mod checks;
mod registry;

pub use registry::{NotApplied, PassOutcome, TestRegistry};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::geometry::LandMask;
use crate::types::{DeploymentMetadata, FlagSeries, Observation};

// ============================================================================
// Errors
// ============================================================================

/// Why a single test could not be applied. Always recoverable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QcError {
    #[error("unknown test '{0}'")]
    UnknownTest(String),

    #[error("invalid parameter for {test}: {message}")]
    InvalidParameter { test: String, message: String },

    #[error("metadata attribute '{0}' is missing")]
    MissingAttribute(String),

    #[error("{0} is not loaded")]
    MissingReference(&'static str),

    #[error("series is empty")]
    EmptySeries,

    #[error("numeric failure: {0}")]
    Numeric(String),

    #[error("series '{series}' has {actual} flags for {expected} observations")]
    LengthMismatch {
        series: String,
        expected: usize,
        actual: usize,
    },

    #[error("test panicked: {0}")]
    Panicked(String),
}

// ============================================================================
// Pass
// ============================================================================

/// Which of the two test passes is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QcPass {
    /// Position-independent tests, before position inference
    First,
    /// Tests that read the inferred position or gear class
    Second,
}

impl fmt::Display for QcPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QcPass::First => write!(f, "first"),
            QcPass::Second => write!(f, "second"),
        }
    }
}

// ============================================================================
// Context & Parameters
// ============================================================================

/// Read-only view of a deployment handed to each test.
#[derive(Debug, Clone, Copy)]
pub struct QcContext<'a> {
    pub deployment_id: &'a str,
    pub observations: &'a [Observation],
    pub metadata: &'a DeploymentMetadata,
    /// Wall-clock time of the processing run (upper date bound fallback)
    pub run_time: DateTime<Utc>,
    pub land: Option<&'a LandMask>,
}

impl<'a> QcContext<'a> {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Explicit parameter table for one test invocation (`[tests.<name>]`).
///
/// Parameter structs are deserialised fresh from this table on every call,
/// so no invocation can see state left behind by another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestParams {
    table: toml::Table,
}

impl TestParams {
    pub fn new(table: toml::Table) -> Self {
        Self { table }
    }

    /// Parse the table into a test's parameter struct.
    ///
    /// Keys missing from the table take the struct's serde defaults.
    pub fn parse<T: DeserializeOwned>(&self, test: &str) -> Result<T, QcError> {
        toml::Value::Table(self.table.clone())
            .try_into()
            .map_err(|e: toml::de::Error| QcError::InvalidParameter {
                test: test.to_string(),
                message: e.message().to_string(),
            })
    }

    /// The category override, if one was configured.
    pub fn category(&self) -> Option<&str> {
        self.table.get("category").and_then(|v| v.as_str())
    }

    pub fn table(&self) -> &toml::Table {
        &self.table
    }
}

impl From<toml::Table> for TestParams {
    fn from(table: toml::Table) -> Self {
        Self::new(table)
    }
}

// ============================================================================
// Test Trait
// ============================================================================

/// A single named quality test.
pub trait QcTest: Send + Sync {
    /// Registry name, e.g. `spike`
    fn name(&self) -> &'static str;

    /// One-line description for `fishgear-qc tests`
    fn description(&self) -> &'static str;

    /// Parameter keys this test understands (used to warn about typos in config)
    fn parameter_names(&self) -> &'static [&'static str];

    /// Opt-in tests are registered but never part of the default pass lists
    fn opt_in(&self) -> bool {
        false
    }

    /// Evaluate the series and return the flag columns.
    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FlagValue;

    #[derive(Debug, Deserialize)]
    #[serde(default)]
    struct Example {
        threshold: f64,
        fail_flag: FlagValue,
    }

    impl Default for Example {
        fn default() -> Self {
            Self {
                threshold: 2.0,
                fail_flag: FlagValue::Bad,
            }
        }
    }

    #[test]
    fn test_params_fill_defaults() {
        let params = TestParams::default();
        let parsed: Example = params.parse("example").unwrap();
        assert_eq!(parsed.threshold, 2.0);
        assert_eq!(parsed.fail_flag, FlagValue::Bad);
    }

    #[test]
    fn test_params_reject_invalid_flag() {
        let table: toml::Table = "fail_flag = 7".parse().unwrap();
        let err = TestParams::new(table).parse::<Example>("example").unwrap_err();
        assert!(matches!(err, QcError::InvalidParameter { .. }));
    }

    #[test]
    fn test_params_category_override() {
        let table: toml::Table = "category = \"none\"\nthreshold = 4.0".parse().unwrap();
        let params = TestParams::new(table);
        assert_eq!(params.category(), Some("none"));
        let parsed: Example = params.parse("example").unwrap();
        assert_eq!(parsed.threshold, 4.0);
    }
}
