//! Gear classifier: resolve a deployment's gear class from fisher metadata
//!
//! A sensor's serial number and observed time span are matched against the
//! fisher metadata table. Exactly one matching row resolves the gear class
//! and attaches the owner/vessel attributes; anything else fails the
//! deployment with an explicit failure mode.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::types::{attrs, Deployment, GearClass};

// ============================================================================
// Fisher Metadata
// ============================================================================

/// One row of the fisher metadata table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FisherRecord {
    /// Normalised sensor serial number
    pub serial_number: String,
    pub date_supplied: Option<NaiveDate>,
    /// `None` while the sensor is still out with the fisher
    pub date_returned: Option<NaiveDate>,
    pub fishing_method: String,
    pub vessel_name: Option<String>,
    pub contact_email: Option<String>,
    /// Deck unit the sensor is expected to upload through
    pub deck_unit_serial: Option<String>,
    /// Any other columns, kept verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl FisherRecord {
    /// Whether a deployment spanning `start..=end` falls inside this record's
    /// supply window. The return date counts until midnight plus `grace_days`.
    pub fn covers(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        grace_days: i64,
        run_time: DateTime<Utc>,
    ) -> bool {
        let Some(supplied) = self.date_supplied.and_then(|d| d.and_hms_opt(0, 0, 0)) else {
            return false;
        };
        let returned = match self.date_returned.and_then(|d| d.and_hms_opt(0, 0, 0)) {
            Some(d) => d.and_utc() + Duration::days(grace_days),
            None => run_time,
        };
        start >= supplied.and_utc() && end <= returned
    }
}

/// The fisher metadata table, shared read-only across deployments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FisherMetadata {
    records: Vec<FisherRecord>,
}

impl FisherMetadata {
    pub fn new(records: Vec<FisherRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[FisherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows for a serial number (compared after normalisation).
    pub fn for_serial<'a>(&'a self, serial: &str) -> impl Iterator<Item = &'a FisherRecord> + 'a {
        let serial = normalize_serial(serial);
        self.records
            .iter()
            .filter(move |r| normalize_serial(&r.serial_number) == serial)
    }
}

/// Canonical form of a serial number: `"02034"`, `"2034.0"` and `" 2034 "`
/// all become `"2034"`. Non-numeric serials are only trimmed.
pub fn normalize_serial(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n >= 0.0 => format!("{}", n as u64),
        _ => trimmed.to_string(),
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a deployment could not be classified. Always deployment-fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("deployment has no sensor serial number")]
    SerialNumberUnknown,

    #[error("deployment has no observations")]
    NoObservations,

    #[error("no fisher metadata row for serial {serial} covers {start} .. {end}")]
    NoValidTimeRange {
        serial: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("{count} fisher metadata rows for serial {serial} cover the deployment")]
    MultipleEntries { serial: String, count: usize },

    #[error("fisher metadata names no expected deck unit for serial {serial}")]
    ExpectedDeckUnitUnknown { serial: String },

    #[error("deck unit {actual:?} does not match expected {expected}")]
    DeckUnitMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("fishing method '{method}' maps to no gear class")]
    GearClassUnknown { method: String },
}

impl ClassificationError {
    /// Stable failure-mode string for status records.
    pub fn failure_mode(&self) -> &'static str {
        match self {
            ClassificationError::SerialNumberUnknown => "serial number unknown",
            ClassificationError::NoObservations => "no observations",
            ClassificationError::NoValidTimeRange { .. } => "no valid time range in fisher metadata",
            ClassificationError::MultipleEntries { .. } => "multiple entries in fisher metadata",
            ClassificationError::ExpectedDeckUnitUnknown { .. } => "expected deck unit unknown",
            ClassificationError::DeckUnitMismatch { .. } => "deck units do not match",
            ClassificationError::GearClassUnknown { .. } => "gear class unknown",
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Resolves gear class from fisher metadata.
pub struct GearClassifier<'a> {
    metadata: &'a FisherMetadata,
    config: &'a ClassifierConfig,
    methods: BTreeMap<String, GearClass>,
}

impl<'a> GearClassifier<'a> {
    pub fn new(metadata: &'a FisherMetadata, config: &'a ClassifierConfig) -> Self {
        let methods = config
            .gear_methods
            .iter()
            .map(|(method, class)| (method.trim().to_lowercase(), *class))
            .collect();
        Self {
            metadata,
            config,
            methods,
        }
    }

    /// Gear class for a free-text fishing method (unmapped → unknown).
    pub fn gear_for_method(&self, method: &str) -> GearClass {
        self.methods
            .get(&method.trim().to_lowercase())
            .copied()
            .unwrap_or(GearClass::Unknown)
    }

    /// Find the single fisher record covering this deployment.
    pub fn find_record(
        &self,
        deployment: &Deployment,
        run_time: DateTime<Utc>,
    ) -> Result<&'a FisherRecord, ClassificationError> {
        let serial = deployment
            .metadata
            .text(attrs::SERIAL_NUMBER)
            .ok_or(ClassificationError::SerialNumberUnknown)?;
        let (start, end) = deployment
            .time_span()
            .ok_or(ClassificationError::NoObservations)?;

        let grace = self.config.return_grace_days;
        let matches: Vec<&FisherRecord> = self
            .metadata
            .for_serial(&serial)
            .filter(|r| r.covers(start, end, grace, run_time))
            .collect();

        match matches.as_slice() {
            [record] => Ok(record),
            [] => Err(ClassificationError::NoValidTimeRange {
                serial: normalize_serial(&serial),
                start,
                end,
            }),
            many => Err(ClassificationError::MultipleEntries {
                serial: normalize_serial(&serial),
                count: many.len(),
            }),
        }
    }

    /// Classify the deployment and attach the matched row's attributes.
    ///
    /// On failure the gear class stays `unknown`.
    pub fn classify(
        &self,
        deployment: &mut Deployment,
        run_time: DateTime<Utc>,
    ) -> Result<GearClass, ClassificationError> {
        deployment.metadata.gear_class = GearClass::Unknown;

        let record = match self.find_record(deployment, run_time) {
            Ok(r) => r,
            Err(e) => {
                warn!(deployment = %deployment.id, error = %e, "Gear classification failed");
                return Err(e);
            }
        };

        let meta = &mut deployment.metadata;
        meta.insert_text(attrs::FISHING_METHOD, record.fishing_method.trim());
        if let Some(v) = &record.vessel_name {
            meta.insert_text(attrs::VESSEL_NAME, v.clone());
        }
        if let Some(v) = &record.contact_email {
            meta.insert_text(attrs::VESSEL_EMAIL, v.clone());
        }
        if let Some(v) = &record.deck_unit_serial {
            meta.insert_text(attrs::EXPECTED_DECK_UNIT_SERIAL, v.clone());
        }
        for (k, v) in &record.extra {
            if !meta.attributes.contains_key(k) {
                meta.insert_text(k.clone(), v.clone());
            }
        }

        if self.config.check_deck_unit {
            self.check_deck_unit(record, deployment)?;
        }

        let gear = self.gear_for_method(&record.fishing_method);
        if gear == GearClass::Unknown {
            let err = ClassificationError::GearClassUnknown {
                method: record.fishing_method.clone(),
            };
            warn!(deployment = %deployment.id, error = %err, "Gear classification failed");
            return Err(err);
        }

        deployment.metadata.gear_class = gear;
        debug!(deployment = %deployment.id, gear = %gear, method = %record.fishing_method, "Gear classified");
        Ok(gear)
    }

    fn check_deck_unit(&self, record: &FisherRecord, deployment: &Deployment) -> Result<(), ClassificationError> {
        let expected = record
            .deck_unit_serial
            .as_deref()
            .map(normalize_serial)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ClassificationError::ExpectedDeckUnitUnknown {
                serial: normalize_serial(&record.serial_number),
            })?;
        let actual = deployment
            .metadata
            .text(attrs::DECK_UNIT_SERIAL)
            .map(|s| normalize_serial(&s));

        if actual.as_deref() != Some(expected.as_str()) {
            let err = ClassificationError::DeckUnitMismatch { expected, actual };
            warn!(deployment = %deployment.id, error = %err, "Deck unit check failed");
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;
    use chrono::TimeZone;

    fn record(serial: &str, supplied: (i32, u32, u32), returned: Option<(i32, u32, u32)>, method: &str) -> FisherRecord {
        FisherRecord {
            serial_number: serial.to_string(),
            date_supplied: NaiveDate::from_ymd_opt(supplied.0, supplied.1, supplied.2),
            date_returned: returned.and_then(|r| NaiveDate::from_ymd_opt(r.0, r.1, r.2)),
            fishing_method: method.to_string(),
            vessel_name: Some("Aroha".to_string()),
            contact_email: Some("skipper@example.org".to_string()),
            deck_unit_serial: Some("77".to_string()),
            extra: BTreeMap::new(),
        }
    }

    fn deployment(serial: &str, day: u32) -> Deployment {
        let t0 = Utc.with_ymd_and_hms(2021, 3, day, 6, 0, 0).unwrap();
        let obs = vec![
            Observation::new(t0, -41.0, 173.0, 1.0, 12.0),
            Observation::new(t0 + Duration::hours(5), -41.0, 173.0, 1.0, 12.0),
        ];
        let mut d = Deployment::new("d", obs);
        d.metadata.insert_text(attrs::SERIAL_NUMBER, serial);
        d.metadata.insert_text(attrs::DECK_UNIT_SERIAL, "77");
        d
    }

    fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_single_match_attaches_metadata() {
        let table = FisherMetadata::new(vec![record("2034", (2021, 1, 1), Some((2021, 4, 1)), "Potting")]);
        let config = ClassifierConfig::default();
        let mut d = deployment("02034", 10);
        let gear = GearClassifier::new(&table, &config).classify(&mut d, run_time()).unwrap();
        assert_eq!(gear, GearClass::Stationary);
        assert_eq!(d.metadata.gear_class, GearClass::Stationary);
        assert_eq!(d.metadata.text(attrs::VESSEL_NAME).as_deref(), Some("Aroha"));
        assert_eq!(d.metadata.text(attrs::EXPECTED_DECK_UNIT_SERIAL).as_deref(), Some("77"));
    }

    #[test]
    fn test_no_match_fails_with_mode() {
        let table = FisherMetadata::new(vec![record("2034", (2021, 4, 1), None, "Potting")]);
        let config = ClassifierConfig::default();
        let mut d = deployment("2034", 10);
        let err = GearClassifier::new(&table, &config).classify(&mut d, run_time()).unwrap_err();
        assert_eq!(err.failure_mode(), "no valid time range in fisher metadata");
        assert_eq!(d.metadata.gear_class, GearClass::Unknown);
    }

    #[test]
    fn test_multiple_matches_fail() {
        let table = FisherMetadata::new(vec![
            record("2034", (2021, 1, 1), None, "Potting"),
            record("2034", (2021, 2, 1), Some((2021, 5, 1)), "Trawling"),
        ]);
        let config = ClassifierConfig::default();
        let mut d = deployment("2034", 10);
        let err = GearClassifier::new(&table, &config).classify(&mut d, run_time()).unwrap_err();
        assert_eq!(err, ClassificationError::MultipleEntries { serial: "2034".to_string(), count: 2 });
    }

    #[test]
    fn test_return_day_is_inclusive() {
        // Deployment on the return date itself (06:00-11:00)
        let table = FisherMetadata::new(vec![record("1", (2021, 1, 1), Some((2021, 3, 10)), "Dredge")]);
        let config = ClassifierConfig::default();
        let mut d = deployment("1", 10);
        assert_eq!(
            GearClassifier::new(&table, &config).classify(&mut d, run_time()),
            Ok(GearClass::Mobile)
        );
    }

    #[test]
    fn test_open_ended_record_uses_run_time() {
        let table = FisherMetadata::new(vec![record("1", (2021, 1, 1), None, "Set netting")]);
        let config = ClassifierConfig::default();
        let mut d = deployment("1", 10);
        let early_run = Utc.with_ymd_and_hms(2021, 3, 10, 8, 0, 0).unwrap();
        let classifier = GearClassifier::new(&table, &config);
        assert!(classifier.classify(&mut d, early_run).is_err());
        assert_eq!(classifier.classify(&mut d, run_time()), Ok(GearClass::Stationary));
    }

    #[test]
    fn test_unmapped_method_is_gear_unknown() {
        let table = FisherMetadata::new(vec![record("1", (2021, 1, 1), None, "Whaling")]);
        let config = ClassifierConfig::default();
        let mut d = deployment("1", 10);
        let err = GearClassifier::new(&table, &config).classify(&mut d, run_time()).unwrap_err();
        assert_eq!(err.failure_mode(), "gear class unknown");
    }

    #[test]
    fn test_deck_unit_checks() {
        let config = ClassifierConfig::default();

        let mut no_expected = record("1", (2021, 1, 1), None, "Potting");
        no_expected.deck_unit_serial = None;
        let table = FisherMetadata::new(vec![no_expected]);
        let mut d = deployment("1", 10);
        let err = GearClassifier::new(&table, &config).classify(&mut d, run_time()).unwrap_err();
        assert_eq!(err.failure_mode(), "expected deck unit unknown");

        let table = FisherMetadata::new(vec![record("1", (2021, 1, 1), None, "Potting")]);
        let mut d = deployment("1", 10);
        d.metadata.insert_text(attrs::DECK_UNIT_SERIAL, "78");
        let err = GearClassifier::new(&table, &config).classify(&mut d, run_time()).unwrap_err();
        assert_eq!(err.failure_mode(), "deck units do not match");

        let relaxed = ClassifierConfig {
            check_deck_unit: false,
            ..ClassifierConfig::default()
        };
        assert!(GearClassifier::new(&table, &relaxed).classify(&mut d, run_time()).is_ok());
    }

    #[test]
    fn test_method_lookup_ignores_case_and_whitespace() {
        let table = FisherMetadata::default();
        let config = ClassifierConfig::default();
        let c = GearClassifier::new(&table, &config);
        assert_eq!(c.gear_for_method("  bottom TRAWL "), GearClass::Mobile);
        assert_eq!(c.gear_for_method("unknown method"), GearClass::Unknown);
    }

    #[test]
    fn test_normalize_serial() {
        assert_eq!(normalize_serial(" 02034 "), "2034");
        assert_eq!(normalize_serial("2034.0"), "2034");
        assert_eq!(normalize_serial("MP-7"), "MP-7");
    }
}
