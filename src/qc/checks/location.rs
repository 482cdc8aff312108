//! Position tests: coordinate range, reference-site exclusion, land mask

use serde::Deserialize;

use super::category;
use crate::geometry::haversine_m;
use crate::qc::{QcContext, QcError, QcTest, TestParams};
use crate::types::{FlagSeries, FlagValue};

// ============================================================================
// Location Range
// ============================================================================

/// Flags coordinates outside the configured latitude/longitude band.
///
/// Readings without a fix (NaN coordinates) are not judged.
pub struct ImpossibleLocation;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LocationParams {
    lat_range: [f64; 2],
    /// Default spans both the -180..180 and 0..360 conventions
    lon_range: [f64; 2],
    /// Values equal to a bound pass when true. Set false for strict bounds,
    /// where a coordinate exactly on a bound is flagged.
    inclusive: bool,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for LocationParams {
    fn default() -> Self {
        Self {
            lat_range: [-90.0, 90.0],
            lon_range: [-180.0, 360.0],
            inclusive: true,
            fail_flag: FlagValue::Bad,
            flag_name: "flag_location".to_string(),
        }
    }
}

fn outside(value: f64, range: [f64; 2], inclusive: bool) -> bool {
    if inclusive {
        value < range[0] || value > range[1]
    } else {
        value <= range[0] || value >= range[1]
    }
}

impl QcTest for ImpossibleLocation {
    fn name(&self) -> &'static str {
        "impossible_location"
    }

    fn description(&self) -> &'static str {
        "Latitude or longitude outside the configured band"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["lat_range", "lon_range", "inclusive", "fail_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: LocationParams = params.parse(self.name())?;
        if p.lat_range[0] > p.lat_range[1] || p.lon_range[0] > p.lon_range[1] {
            return Err(QcError::InvalidParameter {
                test: self.name().to_string(),
                message: "range lower bound exceeds upper bound".to_string(),
            });
        }

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::POSITION, ctx.len());
        for (i, obs) in ctx.observations.iter().enumerate() {
            let bad_lat = obs.latitude.is_finite() && outside(obs.latitude, p.lat_range, p.inclusive);
            let bad_lon = obs.longitude.is_finite() && outside(obs.longitude, p.lon_range, p.inclusive);
            if bad_lat || bad_lon {
                flags.raise(i, p.fail_flag);
            }
        }
        Ok(vec![flags])
    }
}

// ============================================================================
// Reference Location
// ============================================================================

/// Flags fixes within `bad_radius` metres of a calibration site, so bench
/// tests that were never offloaded do not leak into field records.
pub struct RemoveRefLocation;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RefLocationParams {
    ref_lat: f64,
    ref_lon: f64,
    /// metres
    bad_radius: f64,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for RefLocationParams {
    fn default() -> Self {
        Self {
            ref_lat: -41.25707,
            ref_lon: 173.28393,
            bad_radius: 5000.0,
            fail_flag: FlagValue::Bad,
            flag_name: "flag_ref_loc".to_string(),
        }
    }
}

impl QcTest for RemoveRefLocation {
    fn name(&self) -> &'static str {
        "remove_ref_location"
    }

    fn description(&self) -> &'static str {
        "Fixes within a radius of a known calibration site"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["ref_lat", "ref_lon", "bad_radius", "fail_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: RefLocationParams = params.parse(self.name())?;
        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::POSITION, ctx.len());
        for (i, obs) in ctx.observations.iter().enumerate() {
            if !obs.has_fix() {
                continue;
            }
            if haversine_m(p.ref_lat, p.ref_lon, obs.latitude, obs.longitude) < p.bad_radius {
                flags.raise(i, p.fail_flag);
            }
        }
        Ok(vec![flags])
    }
}

// ============================================================================
// Position On Land
// ============================================================================

/// Flags fixes that sit solidly on land, allowing for GPS error at the coast.
pub struct PositionOnLand;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LandParams {
    /// metres from the nearest coastline vertex
    tolerance: f64,
    fail_flag: FlagValue,
    flag_name: String,
}

impl Default for LandParams {
    fn default() -> Self {
        Self {
            tolerance: 200.0,
            fail_flag: FlagValue::Suspect,
            flag_name: "flag_land".to_string(),
        }
    }
}

impl QcTest for PositionOnLand {
    fn name(&self) -> &'static str {
        "position_on_land"
    }

    fn description(&self) -> &'static str {
        "Fixes inside a coastline polygon and beyond the GPS tolerance"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["tolerance", "fail_flag", "flag_name"]
    }

    fn apply(&self, ctx: &QcContext<'_>, params: &TestParams) -> Result<Vec<FlagSeries>, QcError> {
        let p: LandParams = params.parse(self.name())?;
        let land = ctx.land.ok_or(QcError::MissingReference("land mask"))?;

        let mut flags = FlagSeries::good(p.flag_name, self.name(), category::POSITION, ctx.len());
        for (i, obs) in ctx.observations.iter().enumerate() {
            if land.contains_solidly(obs.latitude, obs.longitude, p.tolerance) {
                flags.raise(i, p.fail_flag);
            }
        }
        Ok(vec![flags])
    }
}
