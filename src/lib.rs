//! Fishgear QC: quality control for fishing-gear sensor deployments
//!
//! Temperature/pressure sensors on fishing gear report timestamped readings
//! plus a GPS fix whenever the gear is at the surface. This crate flags each
//! reading with a 1-4 quality score.
//!
//! ## Architecture
//!
//! - **Types**: observations, flag series, deployments and their metadata
//! - **QC Catalog**: named, parameterized tests behind a registry
//! - **Classifier**: fisher-metadata lookup deciding mobile vs stationary gear
//! - **Position**: stationary position inference and longitude normalization
//! - **Aggregate**: worst-case reduction to overall and category flags
//! - **Pipeline**: the per-deployment sequence and the parallel batch runner
//! - **Input**: CSV/JSON readers and the QC and status writers

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod geometry;
pub mod input;
pub mod pipeline;
pub mod position;
pub mod qc;
pub mod types;

// Re-export configuration
pub use config::QcConfig;

// Re-export commonly used types
pub use types::{
    Deployment, DeploymentMetadata, FlagSeries, FlagValue, GearClass, Observation, Variable,
};

// Re-export the QC core
pub use aggregate::{AggregateFlags, FlagAggregator};
pub use classifier::{FisherMetadata, FisherRecord, GearClassifier};
pub use position::{Phase, PositionEstimator};
pub use qc::{QcContext, QcError, QcPass, QcTest, TestParams, TestRegistry};

// Re-export the pipeline
pub use pipeline::{
    BatchReport, BatchRunner, DeploymentOutcome, DeploymentProcessor, DeploymentStatus,
    PipelineError, QcOutput,
};
