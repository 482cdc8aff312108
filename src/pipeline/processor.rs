//! Per-deployment processor: classification, two QC passes, position
//! inference and aggregation for one deployment, start to finish.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::outcome::{DeploymentOutcome, PipelineError, QcOutput};
use crate::aggregate::FlagAggregator;
use crate::classifier::{FisherMetadata, GearClassifier};
use crate::config::QcConfig;
use crate::geometry::{depth_from_pressure, LandMask};
use crate::position::{label_phases, PositionEstimator};
use crate::qc::{QcContext, QcPass, TestRegistry};
use crate::types::{Deployment, Observation};

/// Runs the full QC sequence for single deployments.
///
/// Holds only shared read-only inputs, so one processor can serve many
/// deployments concurrently.
pub struct DeploymentProcessor<'a> {
    config: &'a QcConfig,
    registry: &'a TestRegistry,
    fisher: &'a FisherMetadata,
    land: Option<&'a LandMask>,
    run_time: DateTime<Utc>,
}

impl<'a> DeploymentProcessor<'a> {
    pub fn new(
        config: &'a QcConfig,
        registry: &'a TestRegistry,
        fisher: &'a FisherMetadata,
        land: Option<&'a LandMask>,
    ) -> Self {
        Self {
            config,
            registry,
            fisher,
            land,
            run_time: Utc::now(),
        }
    }

    /// Pin the run time (date-test upper bound, open-ended fisher records).
    pub fn with_run_time(mut self, run_time: DateTime<Utc>) -> Self {
        self.run_time = run_time;
        self
    }

    pub fn run_time(&self) -> DateTime<Utc> {
        self.run_time
    }

    /// Process one deployment.
    pub fn process(&self, mut deployment: Deployment) -> DeploymentOutcome {
        if deployment.is_empty() {
            return failed(deployment, PipelineError::NoObservations, Vec::new());
        }

        // STEP 1: Ordering
        let order = deployment.ensure_time_order();
        if !order.is_clean() {
            warn!(
                deployment = %deployment.id,
                reordered = order.reordered,
                duplicates_dropped = order.duplicates_dropped,
                "Observations were not in time order"
            );
        }

        // STEP 2: Gear classification
        let classifier = GearClassifier::new(self.fisher, &self.config.classifier);
        if let Err(e) = classifier.classify(&mut deployment, self.run_time) {
            return failed(deployment, e.into(), Vec::new());
        }

        // STEP 3: First pass (measured fixes)
        let mut passes = {
            let ctx = self.context(&deployment);
            self.registry
                .run(QcPass::First, &self.config.pipeline.first_pass, &ctx, &self.config.tests)
        };

        // STEP 4: Position inference
        let estimator = PositionEstimator::new(&self.config.position);
        let position = match estimator.apply(&mut deployment, &passes.series) {
            Ok(p) => p,
            Err(e) => return failed(deployment, e.into(), passes.applied),
        };

        // STEP 5: Second pass (estimator attributes)
        let second = {
            let ctx = self.context(&deployment);
            self.registry
                .run(QcPass::Second, &self.config.pipeline.second_pass, &ctx, &self.config.tests)
        };
        passes.extend(second);

        // STEP 6: Aggregation
        let aggregate = FlagAggregator::new().aggregate(deployment.len(), &passes.series);

        let phases = label_phases(&deployment.observations, self.config.phase.profile_cutoff_secs);
        let depth = self
            .config
            .pipeline
            .convert_pressure_to_depth
            .then(|| depths(&deployment.observations, self.config.pipeline.default_latitude));

        let rejected = aggregate.all_bad();
        let counts = aggregate.counts();
        let output = QcOutput {
            deployment,
            phases,
            depth,
            series: passes.series,
            aggregate,
            position,
            tests_applied: passes.applied,
            tests_not_applied: passes.not_applied,
        };

        if rejected {
            warn!(deployment = %output.deployment.id, observations = output.deployment.len(), "No good data, all QC flags = 4");
            DeploymentOutcome::Rejected(output)
        } else {
            info!(
                deployment = %output.deployment.id,
                gear = %output.deployment.metadata.gear_class,
                good = counts[0],
                probably_good = counts[1],
                suspect = counts[2],
                bad = counts[3],
                not_applied = output.tests_not_applied.len(),
                "Deployment QC complete"
            );
            DeploymentOutcome::Completed(output)
        }
    }

    fn context<'d>(&self, deployment: &'d Deployment) -> QcContext<'d>
    where
        'a: 'd,
    {
        QcContext {
            deployment_id: &deployment.id,
            observations: &deployment.observations,
            metadata: &deployment.metadata,
            run_time: self.run_time,
            land: self.land,
        }
    }
}

fn failed(deployment: Deployment, error: PipelineError, tests_applied: Vec<String>) -> DeploymentOutcome {
    warn!(
        deployment = %deployment.id,
        failure_mode = error.failure_mode(),
        error = %error,
        "Deployment failed"
    );
    DeploymentOutcome::Failed {
        deployment_id: deployment.id.clone(),
        deployment: Some(Box::new(deployment)),
        error,
        tests_applied,
    }
}

/// Depth for every observation, using the mean latitude of the fixes
/// (or `default_latitude` without any).
fn depths(observations: &[Observation], default_latitude: f64) -> Vec<f64> {
    let lats: Vec<f64> = observations
        .iter()
        .map(|o| o.latitude)
        .filter(|l| l.is_finite())
        .collect();
    let latitude = if lats.is_empty() {
        default_latitude
    } else {
        lats.iter().sum::<f64>() / lats.len() as f64
    };
    debug!(latitude, "Converting pressure to depth");
    observations
        .iter()
        .map(|o| depth_from_pressure(o.pressure, latitude))
        .collect()
}
