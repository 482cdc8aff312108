//! Geometry utilities: great-circle distance, speed between fixes, land test
//!
//! Pure functions over degrees. Nothing here panics on NaN input; distances
//! involving a missing coordinate come back as NaN and speeds as `None`.

use serde::{Deserialize, Serialize};

use crate::types::Observation;

/// Mean Earth radius (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 1 km/h expressed in knots
pub const KMH_TO_KNOTS: f64 = 0.539957;

/// 1 km/h expressed in miles per hour
pub const KMH_TO_MPH: f64 = 0.621371;

// ============================================================================
// Distance & Bearing
// ============================================================================

/// Great-circle distance between two points (km), haversine formula.
///
/// Safe across the antimeridian and at the poles: the haversine term is
/// clamped to [0, 1] so rounding never pushes `asin` out of its domain.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Great-circle distance in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_km(lat1, lon1, lat2, lon2) * 1000.0
}

/// Initial bearing from point 1 to point 2, degrees clockwise from north (0..360).
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

// ============================================================================
// Speed
// ============================================================================

/// Unit for speeds between fixes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedUnit {
    #[default]
    Knots,
    Kmh,
    Mph,
}

impl SpeedUnit {
    fn from_kmh(self, kmh: f64) -> f64 {
        match self {
            SpeedUnit::Knots => kmh * KMH_TO_KNOTS,
            SpeedUnit::Kmh => kmh,
            SpeedUnit::Mph => kmh * KMH_TO_MPH,
        }
    }
}

/// Speed needed to travel from `a` to `b` in the elapsed time.
///
/// Returns `None` when no time elapsed or either fix is missing; a zero
/// interval must never be read as "stationary" or "infinitely fast".
pub fn speed_between(a: &Observation, b: &Observation, unit: SpeedUnit) -> Option<f64> {
    let elapsed_ms = (b.timestamp - a.timestamp).num_milliseconds();
    if elapsed_ms == 0 || !a.has_fix() || !b.has_fix() {
        return None;
    }
    let hours = elapsed_ms.abs() as f64 / 3_600_000.0;
    let km = haversine_km(a.latitude, a.longitude, b.latitude, b.longitude);
    Some(unit.from_kmh(km / hours))
}

/// Per-observation speed of the step arriving at each observation.
///
/// The first entry is always `None`.
pub fn step_speeds(observations: &[Observation], unit: SpeedUnit) -> Vec<Option<f64>> {
    let mut speeds = Vec::with_capacity(observations.len());
    if observations.is_empty() {
        return speeds;
    }
    speeds.push(None);
    for w in observations.windows(2) {
        speeds.push(speed_between(&w[0], &w[1], unit));
    }
    speeds
}

// ============================================================================
// Longitude Conventions
// ============================================================================

/// Normalise a longitude to [-180, 180).
pub fn normalize_lon_180(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Normalise a longitude to [0, 360).
pub fn normalize_lon_360(lon: f64) -> f64 {
    lon.rem_euclid(360.0)
}

/// Mean of longitudes on the circle, so 179 and -179 average to 180 rather than 0.
///
/// Result is in [-180, 180). Non-finite inputs are ignored.
pub fn circular_mean_lon(lons: &[f64]) -> Option<f64> {
    let (mut s, mut c, mut n) = (0.0, 0.0, 0usize);
    for lon in lons.iter().filter(|l| l.is_finite()) {
        let r = lon.to_radians();
        s += r.sin();
        c += r.cos();
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(normalize_lon_180(s.atan2(c).to_degrees()))
}

// ============================================================================
// Land Mask
// ============================================================================

/// A closed ring of `[lon, lat]` vertices in -180..180.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub vertices: Vec<[f64; 2]>,
}

impl Polygon {
    pub fn new(vertices: Vec<[f64; 2]>) -> Self {
        Self { vertices }
    }

    /// Ray-casting point-in-polygon test.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let v = &self.vertices;
        if v.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = v.len() - 1;
        for i in 0..v.len() {
            let (xi, yi) = (v[i][0], v[i][1]);
            let (xj, yj) = (v[j][0], v[j][1]);
            if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Distance (m) from a point to the nearest vertex.
    pub fn nearest_vertex_m(&self, lat: f64, lon: f64) -> f64 {
        self.vertices
            .iter()
            .map(|v| haversine_m(lat, lon, v[1], v[0]))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Coastline polygon set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandMask {
    pub polygons: Vec<Polygon>,
}

impl LandMask {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// True when the point is inside some polygon and further than
    /// `tolerance_m` from that polygon's nearest vertex.
    ///
    /// Longitude may be in either convention; it is normalised first.
    pub fn contains_solidly(&self, lat: f64, lon: f64, tolerance_m: f64) -> bool {
        if !lat.is_finite() || !lon.is_finite() {
            return false;
        }
        let lon = normalize_lon_180(lon);
        self.polygons
            .iter()
            .any(|p| p.contains(lat, lon) && p.nearest_vertex_m(lat, lon) > tolerance_m)
    }
}

// ============================================================================
// Pressure → Depth
// ============================================================================

/// Depth (m) from pressure (dbar) and latitude, UNESCO 1983 (Saunders & Fofonoff).
pub fn depth_from_pressure(pressure_dbar: f64, latitude: f64) -> f64 {
    let p = pressure_dbar;
    let x = (latitude / 57.29578).sin().powi(2);
    let gr = 9.780318 * (1.0 + (5.2788e-3 + 2.36e-5 * x) * x) + 1.092e-6 * p;
    ((((-1.82e-15 * p + 2.279e-10) * p - 2.2512e-5) * p + 9.72659) * p) / gr
}
