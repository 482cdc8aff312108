//! QC Configuration Module
//!
//! Test selection, per-test parameters and pipeline tuning, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line (errors are fatal)
//! 2. `FISHGEAR_QC_CONFIG` environment variable (path to TOML file)
//! 3. `qc_config.toml` in the current working directory
//! 4. Built-in defaults
//!
//! ## Usage
//!
//! The loaded config is passed by reference to the processor; there is no
//! process-wide instance.
//!
//! ```ignore
//! let config = QcConfig::load();
//! let processor = DeploymentProcessor::new(&config, &registry, &fisher, land.as_ref());
//! ```

mod qc_config;
pub mod defaults;
pub mod validation;

pub use qc_config::*;
