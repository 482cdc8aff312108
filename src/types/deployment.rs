//! Deployments: one sensor's observation series plus its metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::Observation;

// ============================================================================
// Gear Class
// ============================================================================

/// How the gear carrying the sensor moves while fishing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GearClass {
    /// Pots, set nets, long lines: positions are derived, not measured
    Stationary,
    /// Trawls and dredges: every fix is a real position
    Mobile,
    #[default]
    Unknown,
}

impl fmt::Display for GearClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GearClass::Stationary => write!(f, "stationary"),
            GearClass::Mobile => write!(f, "mobile"),
            GearClass::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for GearClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stationary" => Ok(GearClass::Stationary),
            "mobile" => Ok(GearClass::Mobile),
            "unknown" => Ok(GearClass::Unknown),
            other => Err(format!("unknown gear class '{other}'")),
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// A single metadata attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Time(DateTime<Utc>),
    Text(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(n) => write!(f, "{n}"),
            AttrValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            AttrValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Well-known attribute keys.
pub mod attrs {
    pub const SERIAL_NUMBER: &str = "serial_number";
    pub const DECK_UNIT_SERIAL: &str = "deck_unit_serial_number";
    pub const EXPECTED_DECK_UNIT_SERIAL: &str = "expected_deck_unit_serial_number";
    pub const DOWNLOAD_TIME: &str = "download_time";
    pub const FISHING_METHOD: &str = "fishing_method";
    pub const VESSEL_NAME: &str = "vessel_name";
    pub const VESSEL_EMAIL: &str = "vessel_email";
    pub const RESET_CODES: &str = "reset_codes";
    pub const LAT_MIN: &str = "geospatial_lat_min";
    pub const LAT_MAX: &str = "geospatial_lat_max";
    pub const LON_MIN: &str = "geospatial_lon_min";
    pub const LON_MAX: &str = "geospatial_lon_max";
    pub const START_END_DIST_M: &str = "start_end_dist_m";
    pub const GOOD_FIX_COUNT: &str = "good_fix_count";
    pub const FIRST_GOOD_PRESSURE: &str = "first_good_fix_pressure";
    pub const LAST_GOOD_PRESSURE: &str = "last_good_fix_pressure";
    pub const INFERRED_LATITUDE: &str = "inferred_latitude";
    pub const INFERRED_LONGITUDE: &str = "inferred_longitude";
}

/// Free-form deployment attributes plus the resolved gear class.
///
/// Tests read this; only the gear classifier and the position estimator
/// write to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentMetadata {
    #[serde(default)]
    pub gear_class: GearClass,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl DeploymentMetadata {
    pub fn insert(&mut self, key: impl Into<String>, value: AttrValue) {
        self.attributes.insert(key.into(), value);
    }

    pub fn insert_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, AttrValue::Text(value.into()));
    }

    pub fn insert_number(&mut self, key: impl Into<String>, value: f64) {
        self.insert(key, AttrValue::Number(value));
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Attribute rendered as text, whatever its stored type.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// Numeric attribute; text values are parsed when possible.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Text(s) => s.trim().parse().ok(),
            AttrValue::Time(_) => None,
        }
    }

    /// Time attribute; RFC 3339 text values are parsed when possible.
    pub fn time(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.get(key)? {
            AttrValue::Time(t) => Some(*t),
            AttrValue::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            AttrValue::Number(_) => None,
        }
    }
}

// ============================================================================
// Deployment
// ============================================================================

/// What `Deployment::ensure_time_order` had to fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderReport {
    pub reordered: bool,
    pub duplicates_dropped: usize,
}

impl OrderReport {
    pub fn is_clean(&self) -> bool {
        !self.reordered && self.duplicates_dropped == 0
    }
}

/// One sensor deployment (typically one uploaded file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Identifier used in logs and status records (usually the file name)
    pub id: String,
    pub observations: Vec<Observation>,
    pub metadata: DeploymentMetadata,
}

impl Deployment {
    pub fn new(id: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            id: id.into(),
            observations,
            metadata: DeploymentMetadata::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// First and last observation times.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.observations.iter().map(|o| o.timestamp).min()?;
        let end = self.observations.iter().map(|o| o.timestamp).max()?;
        Some((start, end))
    }

    /// Whether timestamps are strictly increasing.
    pub fn is_time_ordered(&self) -> bool {
        self.observations
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    }

    /// Stable-sort by timestamp and keep only the first reading of each
    /// duplicated timestamp.
    pub fn ensure_time_order(&mut self) -> OrderReport {
        let mut report = OrderReport::default();
        if self.is_time_ordered() {
            return report;
        }
        let sorted = self
            .observations
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp);
        if !sorted {
            self.observations.sort_by_key(|o| o.timestamp);
            report.reordered = true;
        }
        let before = self.observations.len();
        self.observations.dedup_by_key(|o| o.timestamp);
        report.duplicates_dropped = before - self.observations.len();
        report
    }
}
