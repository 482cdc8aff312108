//! QC Catalog Tests
//!
//! Runs catalog tests through the public registry the way the processor
//! does, and checks the aggregation laws the pipeline relies on.

use chrono::{Duration, TimeZone, Utc};
use fishgear_qc::qc::{PassOutcome, QcContext, QcError, QcPass, TestParams, TestRegistry};
use fishgear_qc::types::{DeploymentMetadata, FlagSeries, FlagValue, Observation};
use fishgear_qc::FlagAggregator;
use std::collections::BTreeMap;

const TEMPS: [f64; 23] = [
    14.5, 13.8, 13.7, 13.6, 13.0, 13.0, 25.0, 13.1, 13.0, 12.9, 12.6, 12.6, 12.6, 12.6, 12.6, 12.6,
    12.9, 12.8, 12.9, 13.2, 13.3, 13.6, 13.7,
];

fn series(temps: &[f64], lons: Option<&[f64]>) -> Vec<Observation> {
    let t0 = Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap();
    temps
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let lon = lons.map_or(173.0, |l| l[i]);
            Observation::new(t0 + Duration::minutes(i as i64), -41.0, lon, 10.0 + i as f64, t)
        })
        .collect()
}

fn context<'a>(observations: &'a [Observation], metadata: &'a DeploymentMetadata) -> QcContext<'a> {
    QcContext {
        deployment_id: "catalog",
        observations,
        metadata,
        run_time: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
        land: None,
    }
}

fn params(raw: &str) -> TestParams {
    TestParams::new(raw.parse().unwrap())
}

fn flag(values: &[u8]) -> Vec<FlagValue> {
    values.iter().map(|v| FlagValue::try_from(*v).unwrap()).collect()
}

// ============================================================================
// Catalog Scenarios
// ============================================================================

#[test]
fn spike_flags_only_the_outlier() {
    let registry = TestRegistry::with_default_tests();
    let obs = series(&TEMPS, None);
    let meta = DeploymentMetadata::default();
    let out = registry
        .apply_one("spike", &context(&obs, &meta), &params("variables = { TEMPERATURE = 3.0 }"))
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].flagged_indices(), vec![6]);
    assert_eq!(out[0].values[6], FlagValue::Bad);
}

#[test]
fn stuck_plateau_is_probably_good() {
    let registry = TestRegistry::with_default_tests();
    let obs = series(&TEMPS, None);
    let meta = DeploymentMetadata::default();
    let out = registry
        .apply_one("stuck_value", &context(&obs, &meta), &params("variables = { TEMPERATURE = 0.05 }"))
        .unwrap();
    assert_eq!(out[0].flagged_indices(), vec![10, 11, 12, 13, 14]);
    assert!(out[0].flagged_indices().iter().all(|&i| out[0].values[i] == FlagValue::ProbablyGood));
}

#[test]
fn location_band_accepts_both_longitude_conventions() {
    let registry = TestRegistry::with_default_tests();
    let lons = [-181.0, -180.0, 0.5, 180.0, 359.9, 360.0, 366.0];
    let obs = series(&TEMPS[..7], Some(&lons));
    let meta = DeploymentMetadata::default();
    let out = registry
        .apply_one("impossible_location", &context(&obs, &meta), &TestParams::default())
        .unwrap();
    assert_eq!(out[0].flagged_indices(), vec![0, 6]);
}

#[test]
fn category_override_relabels_series() {
    let registry = TestRegistry::with_default_tests();
    let obs = series(&TEMPS, None);
    let meta = DeploymentMetadata::default();
    let out = registry
        .apply_one("spike", &context(&obs, &meta), &params("category = \"sensor\""))
        .unwrap();
    assert!(out.iter().all(|s| s.category == "sensor"));
}

#[test]
fn failing_test_does_not_stop_the_pass() {
    let registry = TestRegistry::with_default_tests();
    let obs = series(&TEMPS, None);
    let meta = DeploymentMetadata::default();
    let names: Vec<String> = ["no_such_test", "stuck_value", "spike"].iter().map(|s| s.to_string()).collect();
    let mut config: BTreeMap<String, toml::Table> = BTreeMap::new();
    config.insert("stuck_value".to_string(), "rep_num = 0".parse().unwrap());

    let outcome: PassOutcome = registry.run(QcPass::First, &names, &context(&obs, &meta), &config);
    assert_eq!(outcome.applied, vec!["spike".to_string()]);
    assert_eq!(outcome.not_applied_names(), vec!["no_such_test".to_string(), "stuck_value".to_string()]);
    assert!(matches!(outcome.not_applied[0].reason, QcError::UnknownTest(_)));
    assert!(matches!(outcome.not_applied[1].reason, QcError::InvalidParameter { .. }));
}

#[test]
fn every_registered_test_reports_matching_lengths() {
    let registry = TestRegistry::with_default_tests();
    let obs = series(&TEMPS, None);
    let mut meta = DeploymentMetadata::default();
    meta.gear_class = fishgear_qc::GearClass::Mobile;
    let ctx = context(&obs, &meta);
    for name in registry.names() {
        if let Ok(out) = registry.apply_one(name, &ctx, &TestParams::default()) {
            assert!(out.iter().all(|s| s.len() == obs.len()), "{name}");
        }
    }
}

// ============================================================================
// Aggregation Laws
// ============================================================================

fn column(name: &str, category: &str, values: &[u8]) -> FlagSeries {
    let mut s = FlagSeries::good(name, name, category, values.len());
    s.values = flag(values);
    s
}

#[test]
fn aggregate_is_worst_case_per_category() {
    let series = vec![
        column("a", "timing", &[1, 4, 1, 2]),
        column("b", "position", &[3, 1, 1, 1]),
        column("c", "position", &[1, 1, 2, 1]),
        column("d", "none", &[1, 1, 1, 3]),
    ];
    let agg = FlagAggregator::new().aggregate(4, &series);
    assert_eq!(agg.overall, flag(&[3, 4, 2, 3]));
    assert_eq!(agg.categories["position"], flag(&[3, 1, 2, 1]));
    assert_eq!(agg.categories["timing"], flag(&[1, 4, 1, 2]));
    assert!(!agg.categories.contains_key("none"));
}

#[test]
fn aggregate_ignores_order_and_repetition() {
    let a = column("a", "timing", &[1, 4, 1]);
    let b = column("b", "position", &[3, 1, 2]);
    let aggregator = FlagAggregator::new();
    let forward = aggregator.aggregate(3, &[a.clone(), b.clone()]);
    let backward = aggregator.aggregate(3, &[b.clone(), a.clone()]);
    let doubled = aggregator.aggregate(3, &[a.clone(), b.clone(), a, b]);
    assert_eq!(forward, backward);
    assert_eq!(forward, doubled);
}

#[test]
fn aggregate_without_series_is_all_good() {
    let agg = FlagAggregator::new().aggregate(5, &[]);
    assert_eq!(agg.overall, vec![FlagValue::Good; 5]);
    assert!(agg.categories.is_empty());
    assert!(!agg.all_bad());
}
