//! Batch runner: many deployments, one worker each
//!
//! Deployments are independent, so they are fanned out over a rayon pool.
//! Each one is read, processed and written on a single worker; nothing is
//! shared between them except the read-only inputs held by the processor.
//! One deployment failing never stops the batch.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::outcome::{DeploymentOutcome, DeploymentStatus, PipelineError};
use super::processor::DeploymentProcessor;
use crate::input::InputError;
use crate::types::Deployment;

/// Totals for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    /// Completed and written
    pub succeeded: usize,
    /// Every observation flagged bad
    pub rejected: usize,
    /// Read, classification, position or write failures
    pub failed: usize,
    pub statuses: Vec<DeploymentStatus>,
}

impl BatchReport {
    fn from_statuses(statuses: Vec<DeploymentStatus>, rejected: usize) -> Self {
        let succeeded = statuses.iter().filter(|s| s.saved).count();
        Self {
            processed: statuses.len(),
            succeeded,
            rejected,
            failed: statuses.len() - succeeded - rejected,
            statuses,
        }
    }
}

pub struct BatchRunner<'a> {
    processor: DeploymentProcessor<'a>,
    workers: usize,
}

impl<'a> BatchRunner<'a> {
    /// `workers = 0` uses rayon's global pool (one thread per CPU).
    pub fn new(processor: DeploymentProcessor<'a>, workers: usize) -> Self {
        Self { processor, workers }
    }

    pub fn processor(&self) -> &DeploymentProcessor<'a> {
        &self.processor
    }

    /// Process every input.
    ///
    /// `load` turns an input into a deployment (or reports which file could
    /// not be read); `sink` receives every completed deployment and writes
    /// it out. Statuses come back in input order.
    pub fn run<T, L, S>(&self, inputs: &[T], load: L, sink: S) -> BatchReport
    where
        T: Sync,
        L: Fn(&T) -> Result<Deployment, (String, InputError)> + Sync,
        S: Fn(&DeploymentOutcome) -> Result<(), InputError> + Sync,
    {
        let work = || -> Vec<(DeploymentStatus, bool)> {
            inputs
                .par_iter()
                .map(|input| self.run_one(input, &load, &sink))
                .collect()
        };

        let results = match self.workers {
            0 => work(),
            n => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => pool.install(work),
                Err(e) => {
                    warn!(workers = n, error = %e, "Could not build worker pool, using the global pool");
                    work()
                }
            },
        };

        let rejected = results.iter().filter(|(_, r)| *r).count();
        let report = BatchReport::from_statuses(results.into_iter().map(|(s, _)| s).collect(), rejected);
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            rejected = report.rejected,
            failed = report.failed,
            "Batch complete"
        );
        report
    }

    /// Status plus whether the deployment was rejected as all-bad.
    fn run_one<T, L, S>(&self, input: &T, load: &L, sink: &S) -> (DeploymentStatus, bool)
    where
        L: Fn(&T) -> Result<Deployment, (String, InputError)>,
        S: Fn(&DeploymentOutcome) -> Result<(), InputError>,
    {
        let outcome = match load(input) {
            Ok(deployment) => self.processor.process(deployment),
            Err((id, e)) => {
                warn!(deployment = %id, error = %e, "Could not read deployment");
                DeploymentOutcome::Failed {
                    deployment_id: id,
                    deployment: None,
                    error: PipelineError::Input(e),
                    tests_applied: Vec::new(),
                }
            }
        };

        let mut status = outcome.status();
        if outcome.is_completed() {
            if let Err(e) = sink(&outcome) {
                let error = PipelineError::Output(e);
                warn!(deployment = %outcome.deployment_id(), error = %error, "Could not write deployment");
                status.mark_unsaved(&error);
            }
        }
        (status, matches!(outcome, DeploymentOutcome::Rejected(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{FisherMetadata, FisherRecord};
    use crate::config::QcConfig;
    use crate::qc::TestRegistry;
    use crate::types::{attrs, Observation};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn deployment(id: &str, serial: &str) -> Deployment {
        let t0 = Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap();
        let obs = (0..10)
            .map(|i| Observation::new(t0 + Duration::minutes(i), -41.0, 173.5, 1.0 + i as f64, 13.0))
            .collect();
        let mut d = Deployment::new(id, obs);
        d.metadata.insert_text(attrs::SERIAL_NUMBER, serial);
        d.metadata.insert_text(attrs::DECK_UNIT_SERIAL, "77");
        d
    }

    fn fisher() -> FisherMetadata {
        FisherMetadata::new(vec![FisherRecord {
            serial_number: "1".to_string(),
            date_supplied: NaiveDate::from_ymd_opt(2021, 1, 1),
            fishing_method: "Trawling".to_string(),
            deck_unit_serial: Some("77".to_string()),
            ..FisherRecord::default()
        }])
    }

    #[test]
    fn test_batch_counts_and_order() {
        let config = QcConfig::default();
        let registry = TestRegistry::with_default_tests();
        let table = fisher();
        let run_time = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        let processor = DeploymentProcessor::new(&config, &registry, &table, None).with_run_time(run_time);
        let runner = BatchRunner::new(processor, 2);

        let inputs = vec!["a", "b", "unreadable", "d"];
        let written = AtomicUsize::new(0);
        let report = runner.run(
            &inputs,
            |name| match *name {
                "unreadable" => Err((
                    name.to_string(),
                    InputError::MissingHeader("DateTime (UTC)".to_string()),
                )),
                "b" => Ok(deployment(name, "999")),
                _ => Ok(deployment(name, "1")),
            },
            |_| {
                written.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        assert_eq!(report.processed, 4);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(written.load(Ordering::SeqCst), 2);
        let names: Vec<&str> = report.statuses.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "unreadable", "d"]);
        assert_eq!(report.statuses[2].failure_mode.as_deref(), Some("could not read file"));
    }

    #[test]
    fn test_write_failure_marks_unsaved() {
        let config = QcConfig::default();
        let registry = TestRegistry::with_default_tests();
        let table = fisher();
        let run_time = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        let processor = DeploymentProcessor::new(&config, &registry, &table, None).with_run_time(run_time);
        let runner = BatchRunner::new(processor, 0);

        let report = runner.run(
            &["a"],
            |name| Ok(deployment(name, "1")),
            |_| Err(InputError::MissingColumn("disk full".to_string())),
        );
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.statuses[0].failure_mode.as_deref(), Some("could not write output"));
    }
}
