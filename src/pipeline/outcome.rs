//! Deployment outcomes, deployment-fatal errors and status records

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::AggregateFlags;
use crate::classifier::ClassificationError;
use crate::input::InputError;
use crate::position::{Phase, PositionError, PositionSummary};
use crate::qc::NotApplied;
use crate::types::{attrs, Deployment, FlagSeries, GearClass};

// ============================================================================
// Errors
// ============================================================================

/// Failures that stop a deployment. Per-test failures never end up here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("deployment has no observations")]
    NoObservations,

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("could not write output: {0}")]
    Output(InputError),
}

impl PipelineError {
    /// Stable failure-mode string for status records.
    pub fn failure_mode(&self) -> &'static str {
        match self {
            PipelineError::NoObservations => "no observations",
            PipelineError::Classification(e) => e.failure_mode(),
            PipelineError::Position(e) => e.failure_mode(),
            PipelineError::Input(_) => "could not read file",
            PipelineError::Output(_) => "could not write output",
        }
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// A deployment that made it through both passes.
#[derive(Debug, Clone)]
pub struct QcOutput {
    /// Ordered series with inferred positions applied
    pub deployment: Deployment,
    pub phases: Vec<Phase>,
    /// Depth (m) per observation when depth conversion is on
    pub depth: Option<Vec<f64>>,
    /// Every flag column from both passes, in run order
    pub series: Vec<FlagSeries>,
    pub aggregate: AggregateFlags,
    pub position: PositionSummary,
    pub tests_applied: Vec<String>,
    pub tests_not_applied: Vec<NotApplied>,
}

/// What happened to one deployment.
#[derive(Debug)]
pub enum DeploymentOutcome {
    /// QC'd and holding usable data
    Completed(QcOutput),
    /// QC'd, but every observation is flagged bad; not written out
    Rejected(QcOutput),
    /// Stopped before aggregation
    Failed {
        deployment_id: String,
        /// Present when the file was read
        deployment: Option<Box<Deployment>>,
        error: PipelineError,
        tests_applied: Vec<String>,
    },
}

impl DeploymentOutcome {
    pub fn deployment_id(&self) -> &str {
        match self {
            DeploymentOutcome::Completed(o) | DeploymentOutcome::Rejected(o) => &o.deployment.id,
            DeploymentOutcome::Failed { deployment_id, .. } => deployment_id,
        }
    }

    pub fn output(&self) -> Option<&QcOutput> {
        match self {
            DeploymentOutcome::Completed(o) | DeploymentOutcome::Rejected(o) => Some(o),
            DeploymentOutcome::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, DeploymentOutcome::Completed(_))
    }

    /// Status record for this outcome. `saved` is true for completed
    /// deployments; the batch runner clears it if writing fails.
    pub fn status(&self) -> DeploymentStatus {
        match self {
            DeploymentOutcome::Completed(o) | DeploymentOutcome::Rejected(o) => {
                let counts = o.aggregate.counts();
                let rejected = matches!(self, DeploymentOutcome::Rejected(_));
                let mut status = DeploymentStatus::for_deployment(&o.deployment);
                status.qc_1 = counts[0];
                status.qc_2 = counts[1];
                status.qc_3 = counts[2];
                status.qc_4 = counts[3];
                status.tests_applied = o.tests_applied.clone();
                status.tests_not_applied = o.tests_not_applied.iter().map(|n| n.test.clone()).collect();
                status.saved = !rejected;
                status.failed = rejected;
                if rejected {
                    status.failure_mode = Some("no good data (all QC flags = 4)".to_string());
                }
                status
            }
            DeploymentOutcome::Failed {
                deployment_id,
                deployment,
                error,
                tests_applied,
            } => {
                let mut status = match deployment {
                    Some(d) => DeploymentStatus::for_deployment(d),
                    None => DeploymentStatus::new(deployment_id),
                };
                status.tests_applied = tests_applied.clone();
                status.failed = true;
                status.failure_mode = Some(error.failure_mode().to_string());
                status.detail = Some(error.to_string());
                status
            }
        }
    }
}

// ============================================================================
// Status Record
// ============================================================================

/// One line of the status file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub filename: String,
    pub serial_number: Option<String>,
    pub gear_class: GearClass,
    pub download_time: Option<String>,
    pub reset_codes: Option<String>,
    pub total_obs: usize,
    #[serde(rename = "qc=1")]
    pub qc_1: usize,
    #[serde(rename = "qc=2")]
    pub qc_2: usize,
    #[serde(rename = "qc=3")]
    pub qc_3: usize,
    #[serde(rename = "qc=4")]
    pub qc_4: usize,
    pub tests_applied: Vec<String>,
    pub tests_not_applied: Vec<String>,
    pub saved: bool,
    pub failed: bool,
    pub failure_mode: Option<String>,
    pub detail: Option<String>,
}

impl DeploymentStatus {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    fn for_deployment(d: &Deployment) -> Self {
        Self {
            filename: d.id.clone(),
            serial_number: d.metadata.text(attrs::SERIAL_NUMBER),
            gear_class: d.metadata.gear_class,
            download_time: d.metadata.text(attrs::DOWNLOAD_TIME),
            reset_codes: d.metadata.text(attrs::RESET_CODES),
            total_obs: d.len(),
            ..Self::default()
        }
    }

    /// Mark a completed deployment whose output could not be written.
    pub fn mark_unsaved(&mut self, error: &PipelineError) {
        self.saved = false;
        self.failed = true;
        self.failure_mode = Some(error.failure_mode().to_string());
        self.detail = Some(error.to_string());
    }
}
