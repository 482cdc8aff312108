//! Sensor observation file reader
//!
//! Files start with free `key,value[,units]` header lines, then a column
//! header row whose first cell is the configured marker, then data rows:
//!
//! ```text
//! Moana Serial Number,2034
//! Deck unit serial number,77
//! Battery voltage (V),3.71
//! DateTime (UTC),Lat,Lon,Depth Decibar,Temperature C
//! 20210201T000000,-41.2,173.3,1.2,14.1
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::path::Path;
use tracing::debug;

use super::InputError;
use crate::config::InputConfig;
use crate::types::{attrs, AttrValue, Deployment, DeploymentMetadata, Observation};

/// Header keys that map onto well-known attribute names (after snake-casing).
const KEY_ALIASES: &[(&str, &str)] = &[
    ("moana_serial_number", attrs::SERIAL_NUMBER),
    ("mangopare_serial_number", attrs::SERIAL_NUMBER),
    ("deck_unit_serial_number", attrs::DECK_UNIT_SERIAL),
    ("download_time", attrs::DOWNLOAD_TIME),
];

/// Formats tried for `download_time` header values.
const HEADER_TIME_FORMATS: &[&str] = &["%Y%m%dT%H%M%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Column positions located from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    time: usize,
    lat: usize,
    lon: usize,
    pressure: usize,
    temperature: usize,
}

impl Columns {
    fn locate(header: &csv::StringRecord) -> Result<Self, InputError> {
        let find = |label: &str, matches: &dyn Fn(&str) -> bool| {
            header
                .iter()
                .position(|h| matches(&h.to_lowercase()))
                .ok_or_else(|| InputError::MissingColumn(label.to_string()))
        };
        Ok(Self {
            time: 0,
            lat: find("Lat", &|h| h == "lat" || h.starts_with("latitude"))?,
            lon: find("Lon", &|h| h == "lon" || h.starts_with("longitude"))?,
            pressure: find("Depth/Pressure", &|h| h.contains("depth") || h.contains("pressure"))?,
            temperature: find("Temperature", &|h| h.contains("temp"))?,
        })
    }
}

/// Deployment id for an observation file: its file name.
pub fn deployment_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads observation files into deployments.
pub struct ObservationReader<'a> {
    config: &'a InputConfig,
    units: Regex,
    bracketed: Regex,
}

impl<'a> ObservationReader<'a> {
    pub fn new(config: &'a InputConfig) -> Result<Self, InputError> {
        Ok(Self {
            config,
            units: Regex::new(r"\(.*?\)")?,
            bracketed: Regex::new(r"[\(\[].*?[\)\]]")?,
        })
    }

    /// Read one file; the deployment id is the file name.
    pub fn read_path(&self, path: &Path) -> Result<Deployment, InputError> {
        let contents = std::fs::read_to_string(path).map_err(|e| InputError::io(path, e))?;
        self.read_str(&deployment_id(path), &contents)
    }

    /// Parse file contents.
    ///
    /// Observation order is kept as found; ordering is the processor's job.
    pub fn read_str(&self, id: &str, contents: &str) -> Result<Deployment, InputError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(contents.as_bytes());

        let mut metadata = DeploymentMetadata::default();
        let mut columns: Option<Columns> = None;
        let mut observations = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let Some(cols) = columns else {
                if record.get(0) == Some(self.config.header_marker.as_str()) {
                    columns = Some(Columns::locate(&record)?);
                } else {
                    self.header_attribute(&record, &mut metadata);
                }
                continue;
            };

            let Some(raw_time) = record.get(cols.time).filter(|s| !s.is_empty()) else {
                continue;
            };
            let timestamp = NaiveDateTime::parse_from_str(raw_time, &self.config.timestamp_format)
                .map(|t| t.and_utc())
                .map_err(|_| InputError::Timestamp {
                    row: row + 1,
                    value: raw_time.to_string(),
                })?;

            observations.push(Observation::new(
                timestamp,
                coordinate(record.get(cols.lat)),
                coordinate(record.get(cols.lon)),
                number(record.get(cols.pressure)),
                number(record.get(cols.temperature)),
            ));
        }

        if columns.is_none() {
            return Err(InputError::MissingHeader(self.config.header_marker.clone()));
        }

        let resets = reset_codes(&observations, self.config.reset_temperature, self.config.reset_tolerance);
        if !resets.is_empty() {
            metadata.insert_text(attrs::RESET_CODES, resets);
        }

        debug!(deployment = %id, observations = observations.len(), attributes = metadata.attributes.len(), "Observation file read");
        let mut deployment = Deployment::new(id, observations);
        deployment.metadata = metadata;
        Ok(deployment)
    }

    /// `Key (units),value[,more]` → `key = "value[, more] (units)"`.
    fn header_attribute(&self, record: &csv::StringRecord, metadata: &mut DeploymentMetadata) {
        let Some(raw_key) = record.get(0).filter(|k| !k.is_empty()) else {
            return;
        };
        let units = self
            .units
            .find(raw_key)
            .map(|m| format!(" {}", m.as_str()))
            .unwrap_or_default();
        let value: Vec<&str> = record.iter().skip(1).filter(|v| !v.is_empty()).collect();
        let value = format!("{}{}", value.join(", "), units);

        let key = snake_case(&self.bracketed.replace_all(raw_key, ""));
        let key = KEY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(key);

        if key == attrs::DOWNLOAD_TIME {
            if let Some(t) = parse_header_time(&value) {
                metadata.insert(key, AttrValue::Time(t));
                return;
            }
        }
        metadata.insert_text(key, value);
    }
}

fn snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn number(cell: Option<&str>) -> f64 {
    cell.and_then(|s| s.parse().ok()).unwrap_or(f64::NAN)
}

/// Sensors write 0 for "no fix".
fn coordinate(cell: Option<&str>) -> f64 {
    match number(cell) {
        v if v == 0.0 => f64::NAN,
        v => v,
    }
}

fn parse_header_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    HEADER_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .map(|t| t.and_utc())
}

/// Pressure values (as integer codes) of rows carrying the reset temperature.
pub fn reset_codes(observations: &[Observation], reset_temperature: f64, tolerance: f64) -> String {
    observations
        .iter()
        .filter(|o| (o.temperature - reset_temperature).abs() <= tolerance)
        .map(|o| format!("{}", o.pressure.trunc() as i64))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "\
Moana Serial Number,2034
Deck unit serial number,77
Battery voltage (V),3.71
Download time,20210201T120000
Cellular upload position,-41.2,173.3
DateTime (UTC),Lat,Lon,Depth Decibar,Temperature C
20210201T000000,-41.2,173.3,1.2,14.1
20210201T000100,0,0,25.0,13.0
20210201T000200,,,3.0,44.444
";

    #[test]
    fn test_reads_header_attributes_and_rows() {
        let config = InputConfig::default();
        let d = ObservationReader::new(&config).unwrap().read_str("MOANA_2034_1.csv", SAMPLE).unwrap();
        assert_eq!(d.id, "MOANA_2034_1.csv");
        assert_eq!(d.len(), 3);
        assert_eq!(d.metadata.text(attrs::SERIAL_NUMBER).as_deref(), Some("2034"));
        assert_eq!(d.metadata.text(attrs::DECK_UNIT_SERIAL).as_deref(), Some("77"));
        assert_eq!(d.metadata.text("battery_voltage").as_deref(), Some("3.71 (V)"));
        assert_eq!(d.metadata.text("cellular_upload_position").as_deref(), Some("-41.2, 173.3"));
        assert_eq!(
            d.metadata.time(attrs::DOWNLOAD_TIME),
            Some(Utc.with_ymd_and_hms(2021, 2, 1, 12, 0, 0).unwrap())
        );

        let first = d.observations[0];
        assert_eq!(first.timestamp, Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(first.pressure, 1.2);
        assert!(d.observations[1].latitude.is_nan());
        assert!(d.observations[2].longitude.is_nan());
        assert_eq!(d.metadata.text(attrs::RESET_CODES).as_deref(), Some("3"));
    }

    #[test]
    fn test_missing_header_row() {
        let config = InputConfig::default();
        let err = ObservationReader::new(&config).unwrap().read_str("x", "a,b\n1,2\n").unwrap_err();
        assert!(matches!(err, InputError::MissingHeader(_)));
    }

    #[test]
    fn test_bad_timestamp_reports_row() {
        let config = InputConfig::default();
        let raw = "DateTime (UTC),Lat,Lon,Pressure,Temperature C\nyesterday,1,1,1,1\n";
        let err = ObservationReader::new(&config).unwrap().read_str("x", raw).unwrap_err();
        assert!(matches!(err, InputError::Timestamp { row: 2, .. }));
    }

    #[test]
    fn test_missing_column() {
        let config = InputConfig::default();
        let raw = "DateTime (UTC),Lat,Lon,Temperature C\n";
        let err = ObservationReader::new(&config).unwrap().read_str("x", raw).unwrap_err();
        assert!(matches!(err, InputError::MissingColumn(_)));
    }

    #[test]
    fn test_read_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MOANA_0001_7_210201.csv");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = InputConfig::default();
        let d = ObservationReader::new(&config).unwrap().read_path(&path).unwrap();
        assert_eq!(d.id, "MOANA_0001_7_210201.csv");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case(" Moana Serial Number "), "moana_serial_number");
        assert_eq!(snake_case("DU Battery-Voltage"), "du_battery_voltage");
    }
}
