//! Name → test lookup and ordered execution of a test pass

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use super::{checks, QcContext, QcError, QcPass, QcTest, TestParams};
use crate::types::FlagSeries;

/// A test that was requested but produced no output.
#[derive(Debug, Clone, PartialEq)]
pub struct NotApplied {
    pub test: String,
    pub reason: QcError,
}

/// Result of running one ordered list of tests.
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    pub series: Vec<FlagSeries>,
    pub applied: Vec<String>,
    pub not_applied: Vec<NotApplied>,
}

impl PassOutcome {
    /// Fold another pass into this one, keeping order.
    pub fn extend(&mut self, other: PassOutcome) {
        self.series.extend(other.series);
        self.applied.extend(other.applied);
        self.not_applied.extend(other.not_applied);
    }

    pub fn not_applied_names(&self) -> Vec<String> {
        self.not_applied.iter().map(|n| n.test.clone()).collect()
    }
}

/// Registry of every known test, keyed by name.
pub struct TestRegistry {
    tests: BTreeMap<&'static str, Box<dyn QcTest>>,
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::with_default_tests()
    }
}

impl TestRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            tests: BTreeMap::new(),
        }
    }

    /// Registry holding the full catalog, opt-in tests included.
    pub fn with_default_tests() -> Self {
        let mut registry = Self::new();
        for test in checks::default_tests() {
            registry.register(test);
        }
        registry
    }

    /// Add a test, replacing any test already registered under the same name.
    pub fn register(&mut self, test: Box<dyn QcTest>) {
        if self.tests.insert(test.name(), test).is_some() {
            debug!("Replaced a registered QC test");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn QcTest> {
        self.tests.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tests.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tests.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn QcTest> {
        self.tests.values().map(|t| t.as_ref())
    }

    /// Run `names` in order against one deployment.
    ///
    /// Unknown names, parameter errors, numeric failures, panics and
    /// mis-sized outputs all land in `not_applied`; the remaining tests
    /// still run.
    pub fn run(
        &self,
        pass: QcPass,
        names: &[String],
        ctx: &QcContext<'_>,
        params: &BTreeMap<String, toml::Table>,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::default();

        for name in names {
            let test_params = params
                .get(name)
                .cloned()
                .map(TestParams::new)
                .unwrap_or_default();

            match self.apply_one(name, ctx, &test_params) {
                Ok(series) => {
                    debug!(
                        deployment = %ctx.deployment_id,
                        pass = %pass,
                        test = %name,
                        columns = series.len(),
                        "QC test applied"
                    );
                    outcome.series.extend(series);
                    outcome.applied.push(name.clone());
                }
                Err(reason) => {
                    warn!(
                        deployment = %ctx.deployment_id,
                        pass = %pass,
                        test = %name,
                        error = %reason,
                        "QC test not applied"
                    );
                    outcome.not_applied.push(NotApplied {
                        test: name.clone(),
                        reason,
                    });
                }
            }
        }

        outcome
    }

    /// Run a single test with the registry's safety net: unknown names,
    /// errors and panics come back as `QcError`, and output lengths are
    /// checked against the series.
    pub fn apply_one(
        &self,
        name: &str,
        ctx: &QcContext<'_>,
        params: &TestParams,
    ) -> Result<Vec<FlagSeries>, QcError> {
        let test = self
            .get(name)
            .ok_or_else(|| QcError::UnknownTest(name.to_string()))?;

        let mut series = panic::catch_unwind(AssertUnwindSafe(|| test.apply(ctx, params)))
            .map_err(|payload| QcError::Panicked(panic_message(payload.as_ref())))??;

        for s in &series {
            if s.len() != ctx.len() {
                return Err(QcError::LengthMismatch {
                    series: s.name.clone(),
                    expected: ctx.len(),
                    actual: s.len(),
                });
            }
        }

        if let Some(category) = params.category() {
            for s in &mut series {
                s.category = category.to_string();
            }
        }

        Ok(series)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeploymentMetadata, FlagValue, Observation};
    use chrono::{Duration, TimeZone, Utc};

    struct Constant;

    impl QcTest for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }
        fn description(&self) -> &'static str {
            "flags everything 2"
        }
        fn parameter_names(&self) -> &'static [&'static str] {
            &[]
        }
        fn apply(&self, ctx: &QcContext<'_>, _params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
            let mut s = FlagSeries::good("flag_constant", "constant", "timing", ctx.len());
            s.raise_all(FlagValue::ProbablyGood);
            Ok(vec![s])
        }
    }

    struct Exploding;

    impl QcTest for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }
        fn description(&self) -> &'static str {
            "always panics"
        }
        fn parameter_names(&self) -> &'static [&'static str] {
            &[]
        }
        fn apply(&self, _ctx: &QcContext<'_>, _params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
            panic!("boom")
        }
    }

    struct Short;

    impl QcTest for Short {
        fn name(&self) -> &'static str {
            "short"
        }
        fn description(&self) -> &'static str {
            "returns too few flags"
        }
        fn parameter_names(&self) -> &'static [&'static str] {
            &[]
        }
        fn apply(&self, _ctx: &QcContext<'_>, _params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
            Ok(vec![FlagSeries::good("flag_short", "short", "timing", 1)])
        }
    }

    fn observations() -> Vec<Observation> {
        let t0 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        (0..3)
            .map(|i| Observation::new(t0 + Duration::seconds(i * 60), -41.0, 173.0, 1.0, 12.0))
            .collect()
    }

    fn registry() -> TestRegistry {
        let mut r = TestRegistry::new();
        r.register(Box::new(Constant));
        r.register(Box::new(Exploding));
        r.register(Box::new(Short));
        r
    }

    #[test]
    fn test_failures_do_not_stop_the_pass() {
        let obs = observations();
        let meta = DeploymentMetadata::default();
        let ctx = QcContext {
            deployment_id: "d1",
            observations: &obs,
            metadata: &meta,
            run_time: Utc::now(),
            land: None,
        };
        let names: Vec<String> = ["exploding", "missing", "short", "constant"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let out = registry().run(QcPass::First, &names, &ctx, &BTreeMap::new());

        assert_eq!(out.applied, vec!["constant".to_string()]);
        assert_eq!(out.not_applied_names(), vec!["exploding", "missing", "short"]);
        assert!(matches!(out.not_applied[0].reason, QcError::Panicked(_)));
        assert!(matches!(out.not_applied[1].reason, QcError::UnknownTest(_)));
        assert!(matches!(out.not_applied[2].reason, QcError::LengthMismatch { .. }));
        assert_eq!(out.series.len(), 1);
    }

    #[test]
    fn test_category_override() {
        let obs = observations();
        let meta = DeploymentMetadata::default();
        let ctx = QcContext {
            deployment_id: "d1",
            observations: &obs,
            metadata: &meta,
            run_time: Utc::now(),
            land: None,
        };
        let mut params = BTreeMap::new();
        params.insert("constant".to_string(), "category = \"gear\"".parse::<toml::Table>().unwrap());
        let out = registry().run(QcPass::Second, &["constant".to_string()], &ctx, &params);
        assert_eq!(out.series[0].category, "gear");
    }

    #[test]
    fn test_default_registry_lists_catalog() {
        let r = TestRegistry::with_default_tests();
        for name in ["spike", "stuck_value", "impossible_speed", "climatology_test"] {
            assert!(r.contains(name), "missing {name}");
        }
        assert!(r.get("climatology_test").map(|t| t.opt_in()).unwrap_or(false));
    }
}
