//! Fisher metadata CSV reader

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::InputError;
use crate::classifier::{normalize_serial, FisherMetadata, FisherRecord};
use crate::config::InputConfig;

const SERIAL: &[&str] = &["mangopare serial number", "moana serial number", "serial number"];
const DATE_SUPPLIED: &str = "date supplied";
const DATE_RETURNED: &str = "date returned";
const FISHING_METHOD: &str = "fishing method";
const VESSEL_NAME: &str = "vessel name";
const CONTACT_EMAIL: &str = "contact email";
const DECK_UNIT: &str = "deck unit serial number";

/// Read the fisher metadata table from a file.
pub fn read_fisher_metadata(path: &Path, config: &InputConfig) -> Result<FisherMetadata, InputError> {
    let contents = std::fs::read_to_string(path).map_err(|e| InputError::io(path, e))?;
    let table = parse_fisher_metadata(&contents, config)?;
    info!(path = %path.display(), rows = table.len(), "Loaded fisher metadata");
    Ok(table)
}

/// Parse fisher metadata CSV text.
///
/// Rows without a serial number are skipped. Unparseable dates are kept as
/// missing, so such rows can never match a deployment.
pub fn parse_fisher_metadata(contents: &str, config: &InputConfig) -> Result<FisherMetadata, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_lowercase()).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let serial_col = SERIAL
        .iter()
        .find_map(|name| column(name))
        .ok_or_else(|| InputError::MissingColumn("Mangopare serial number".to_string()))?;
    let supplied_col = column(DATE_SUPPLIED);
    let returned_col = column(DATE_RETURNED);
    let method_col = column(FISHING_METHOD);
    let vessel_col = column(VESSEL_NAME);
    let email_col = column(CONTACT_EMAIL);
    let deck_col = column(DECK_UNIT);
    let known = [Some(serial_col), supplied_col, returned_col, method_col, vessel_col, email_col, deck_col];

    let raw_headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        let Some(serial) = cell(Some(serial_col)) else {
            continue;
        };

        let date = |col: Option<usize>, label: &str| {
            let raw = cell(col)?;
            match NaiveDate::parse_from_str(raw, &config.fisher_date_format) {
                Ok(d) => Some(d),
                Err(_) => {
                    warn!(row = row + 2, column = label, value = raw, "Unparseable fisher metadata date");
                    None
                }
            }
        };

        let extra: BTreeMap<String, String> = raw_headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !known.contains(&Some(*i)))
            .filter_map(|(i, h)| cell(Some(i)).map(|v| (h.to_string(), v.to_string())))
            .collect();

        records.push(FisherRecord {
            serial_number: normalize_serial(serial),
            date_supplied: date(supplied_col, DATE_SUPPLIED),
            date_returned: date(returned_col, DATE_RETURNED),
            fishing_method: cell(method_col).unwrap_or_default().to_string(),
            vessel_name: cell(vessel_col).map(String::from),
            contact_email: cell(email_col).map(String::from),
            deck_unit_serial: cell(deck_col).map(String::from),
            extra,
        });
    }

    Ok(FisherMetadata::new(records))
}
