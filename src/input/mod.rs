//! Thin I/O collaborators around the QC core
//!
//! - [`observations`]: sensor CSV files → [`Deployment`](crate::types::Deployment)
//! - [`fisher`]: fisher metadata CSV → [`FisherMetadata`](crate::classifier::FisherMetadata)
//! - [`land`]: coastline polygons (JSON) → [`LandMask`](crate::geometry::LandMask)
//! - [`output`]: QC'd series CSV and JSON-lines status records

pub mod fisher;
pub mod land;
pub mod observations;
pub mod output;

pub use fisher::read_fisher_metadata;
pub use land::load_land_mask;
pub use observations::{deployment_id, ObservationReader};
pub use output::{qc_file_name, write_qc_csv, StatusWriter};

use std::path::PathBuf;
use thiserror::Error;

/// Reader and writer failures. Fatal for the file concerned only.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("I/O error ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("pattern error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("header row starting with '{0}' not found")]
    MissingHeader(String),

    #[error("required column '{0}' not found")]
    MissingColumn(String),

    #[error("row {row}: cannot parse timestamp '{value}'")]
    Timestamp { row: usize, value: String },
}

impl InputError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InputError::Io {
            path: path.into(),
            source,
        }
    }
}
