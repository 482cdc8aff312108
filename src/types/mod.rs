//! Core data model for fishing-gear sensor quality control
//!
//! - `Observation`: one timestamped position/pressure/temperature reading
//! - `FlagValue` / `FlagSeries`: per-observation quality flags emitted by a test
//! - `GearClass`, `DeploymentMetadata`, `Deployment`: one sensor deployment

mod observation;
mod flags;
mod deployment;

pub use observation::*;
pub use flags::*;
pub use deployment::*;
