//! Sensor observations and the variables tests can monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One sensor reading.
///
/// Latitude/longitude are NaN when the sensor had no GPS fix. Pressure is
/// sensor-relative (dbar) and may be slightly negative near the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    /// Degrees north, -90..90
    pub latitude: f64,
    /// Degrees east, either -180..180 or 0..360 depending on processing stage
    pub longitude: f64,
    /// dbar
    pub pressure: f64,
    /// degC
    pub temperature: f64,
}

impl Observation {
    pub fn new(
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        pressure: f64,
        temperature: f64,
    ) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            pressure,
            temperature,
        }
    }

    /// True when both coordinates are usable numbers.
    pub fn has_fix(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Value of a monitored variable.
    pub fn value(&self, variable: Variable) -> f64 {
        match variable {
            Variable::Pressure => self.pressure,
            Variable::Temperature => self.temperature,
            Variable::Latitude => self.latitude,
            Variable::Longitude => self.longitude,
        }
    }
}

/// Observation columns addressable from test parameters (`PRESSURE`, `TEMPERATURE`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Variable {
    Pressure,
    Temperature,
    Latitude,
    Longitude,
}

impl Variable {
    /// Extract one column from a series.
    pub fn column(self, observations: &[Observation]) -> Vec<f64> {
        observations.iter().map(|o| o.value(self)).collect()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Pressure => write!(f, "PRESSURE"),
            Variable::Temperature => write!(f, "TEMPERATURE"),
            Variable::Latitude => write!(f, "LATITUDE"),
            Variable::Longitude => write!(f, "LONGITUDE"),
        }
    }
}

impl FromStr for Variable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRESSURE" => Ok(Variable::Pressure),
            "TEMPERATURE" => Ok(Variable::Temperature),
            "LATITUDE" => Ok(Variable::Latitude),
            "LONGITUDE" => Ok(Variable::Longitude),
            other => Err(format!("unknown variable '{other}'")),
        }
    }
}
