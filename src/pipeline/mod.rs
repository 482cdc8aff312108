//! QC Pipeline Module
//!
//! ## Per-Deployment Sequence
//!
//! ```text
//! STEP 1: Ordering          (sort by time, drop duplicate timestamps)
//! STEP 2: Gear class        (fisher metadata lookup, deck unit check)
//! STEP 3: First pass        (tests over the measured fixes)
//! STEP 4: Position          (stationary inference / mobile normalization)
//! STEP 5: Second pass       (tests on estimator attributes)
//! STEP 6: Aggregation       (overall + per-category worst flag)
//! ```
//!
//! A failure in steps 2 or 4 ends the deployment; a failing test in steps
//! 3 or 5 is recorded as "not applied" and the sequence carries on.
//! The [`BatchRunner`] fans many deployments out over a worker pool.

mod batch;
mod outcome;
mod processor;

pub use batch::{BatchReport, BatchRunner};
pub use outcome::{DeploymentOutcome, DeploymentStatus, PipelineError, QcOutput};
pub use processor::DeploymentProcessor;
