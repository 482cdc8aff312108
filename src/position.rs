//! Position estimator and deployment phase labelling
//!
//! Runs between the two QC passes. It picks the fixes the first pass judged
//! good, records position bounds and start/end displacement in the
//! deployment metadata, and for stationary gear replaces every position with
//! one averaged surface position.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PositionConfig;
use crate::geometry::{circular_mean_lon, haversine_m, normalize_lon_360};
use crate::types::{attrs, Deployment, FlagSeries, GearClass, Observation};

/// Why a position could not be inferred. Deployment-fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("gear class unknown, cannot choose a position strategy")]
    GearClassUnknown,

    #[error("no good fixes shallower than {surface_pressure} dbar")]
    NoSurfaceFixes { surface_pressure: f64, good_fixes: usize },
}

impl PositionError {
    pub fn failure_mode(&self) -> &'static str {
        match self {
            PositionError::GearClassUnknown => "gear class unknown",
            PositionError::NoSurfaceFixes { .. } => "could not calculate stationary position",
        }
    }
}

/// What the estimator derived for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub gear_class: GearClass,
    /// Fixes that passed every good-fix test
    pub good_fixes: usize,
    /// Of those, fixes shallower than the surface threshold
    pub surface_fixes: usize,
    /// Broadcast position (stationary gear only), longitude in [0, 360)
    pub inferred: Option<(f64, f64)>,
    pub start_end_dist_m: Option<f64>,
}

pub struct PositionEstimator<'a> {
    config: &'a PositionConfig,
}

impl<'a> PositionEstimator<'a> {
    pub fn new(config: &'a PositionConfig) -> Self {
        Self { config }
    }

    /// Indices of observations with a fix that every configured good-fix
    /// test flagged at or below `good_flag_max`.
    ///
    /// Series from tests outside `good_fix_tests` are ignored, as are tests
    /// that were not applied.
    pub fn good_fix_indices(&self, observations: &[Observation], first_pass: &[FlagSeries]) -> Vec<usize> {
        let gates: Vec<&FlagSeries> = first_pass
            .iter()
            .filter(|s| self.config.good_fix_tests.iter().any(|t| *t == s.test))
            .collect();

        observations
            .iter()
            .enumerate()
            .filter(|(i, o)| {
                o.has_fix()
                    && gates
                        .iter()
                        .all(|s| s.values.get(*i).map_or(true, |v| *v <= self.config.good_flag_max))
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Derive positions for the deployment and record the derived attributes.
    pub fn apply(&self, deployment: &mut Deployment, first_pass: &[FlagSeries]) -> Result<PositionSummary, PositionError> {
        let gear_class = deployment.metadata.gear_class;
        if gear_class == GearClass::Unknown {
            return Err(PositionError::GearClassUnknown);
        }

        let good = self.good_fix_indices(&deployment.observations, first_pass);
        let start_end_dist_m = self.record_good_fix_attributes(deployment, &good);

        let mut summary = PositionSummary {
            gear_class,
            good_fixes: good.len(),
            surface_fixes: 0,
            inferred: None,
            start_end_dist_m,
        };

        match gear_class {
            GearClass::Mobile => {
                for o in deployment.observations.iter_mut().filter(|o| o.longitude.is_finite()) {
                    o.longitude = normalize_lon_360(o.longitude);
                }
            }
            GearClass::Stationary => {
                let surface: Vec<&Observation> = good
                    .iter()
                    .map(|&i| &deployment.observations[i])
                    .filter(|o| o.pressure < self.config.surface_pressure)
                    .collect();
                summary.surface_fixes = surface.len();

                let lats: Vec<f64> = surface.iter().map(|o| o.latitude).collect();
                let lons: Vec<f64> = surface.iter().map(|o| o.longitude).collect();
                let (lat, lon) = match (mean(&lats), circular_mean_lon(&lons)) {
                    (Some(lat), Some(lon)) => (lat, normalize_lon_360(lon)),
                    _ => {
                        let err = PositionError::NoSurfaceFixes {
                            surface_pressure: self.config.surface_pressure,
                            good_fixes: good.len(),
                        };
                        warn!(deployment = %deployment.id, error = %err, "Position inference failed");
                        return Err(err);
                    }
                };

                for o in deployment.observations.iter_mut() {
                    o.latitude = lat;
                    o.longitude = lon;
                }
                deployment.metadata.insert_number(attrs::INFERRED_LATITUDE, lat);
                deployment.metadata.insert_number(attrs::INFERRED_LONGITUDE, lon);
                summary.inferred = Some((lat, lon));
            }
            GearClass::Unknown => return Err(PositionError::GearClassUnknown),
        }

        debug!(
            deployment = %deployment.id,
            gear = %gear_class,
            good_fixes = summary.good_fixes,
            surface_fixes = summary.surface_fixes,
            "Position estimated"
        );
        Ok(summary)
    }

    /// Bounds, fix count, first/last good pressure and start/end distance.
    fn record_good_fix_attributes(&self, deployment: &mut Deployment, good: &[usize]) -> Option<f64> {
        let fixes: Vec<Observation> = good.iter().map(|&i| deployment.observations[i]).collect();
        let meta = &mut deployment.metadata;
        meta.insert_number(attrs::GOOD_FIX_COUNT, fixes.len() as f64);

        let (Some(first), Some(last)) = (fixes.first(), fixes.last()) else {
            return None;
        };

        let lons: Vec<f64> = fixes.iter().map(|o| normalize_lon_360(o.longitude)).collect();
        let lats: Vec<f64> = fixes.iter().map(|o| o.latitude).collect();
        meta.insert_number(attrs::LAT_MIN, round6(lats.iter().copied().fold(f64::INFINITY, f64::min)));
        meta.insert_number(attrs::LAT_MAX, round6(lats.iter().copied().fold(f64::NEG_INFINITY, f64::max)));
        meta.insert_number(attrs::LON_MIN, round6(lons.iter().copied().fold(f64::INFINITY, f64::min)));
        meta.insert_number(attrs::LON_MAX, round6(lons.iter().copied().fold(f64::NEG_INFINITY, f64::max)));
        meta.insert_number(attrs::FIRST_GOOD_PRESSURE, first.pressure);
        meta.insert_number(attrs::LAST_GOOD_PRESSURE, last.pressure);

        if fixes.len() < 2 {
            return None;
        }
        let dist = haversine_m(first.latitude, first.longitude, last.latitude, last.longitude);
        meta.insert_number(attrs::START_END_DIST_M, dist);
        Some(dist)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

// ============================================================================
// Deployment Phase
// ============================================================================

/// Whether a reading belongs to a descent/ascent profile or to the gear
/// sitting at depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "P")]
    Profile,
    #[serde(rename = "D")]
    Deployed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Profile => write!(f, "P"),
            Phase::Deployed => write!(f, "D"),
        }
    }
}

/// Label each observation by the gap since the previous one.
///
/// Sensors sample fast while moving through the water column and slowly once
/// settled, so a short gap means profiling. The first reading is `Profile`.
pub fn label_phases(observations: &[Observation], profile_cutoff_secs: i64) -> Vec<Phase> {
    let mut phases = Vec::with_capacity(observations.len());
    for (i, o) in observations.iter().enumerate() {
        let gap = match i {
            0 => 0,
            _ => (o.timestamp - observations[i - 1].timestamp).num_seconds(),
        };
        phases.push(if gap < profile_cutoff_secs {
            Phase::Profile
        } else {
            Phase::Deployed
        });
    }
    phases
}
