//! QC Configuration - test selection, parameters and pipeline tuning
//!
//! Every section implements `Default`, so an empty file (or no file) runs
//! the standard two-pass test suite with built-in parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::qc::TestRegistry;
use crate::types::{FlagValue, GearClass};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a QC run.
///
/// Load with `QcConfig::load()` which searches:
/// 1. `$FISHGEAR_QC_CONFIG` env var
/// 2. `./qc_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcConfig {
    /// Test order and output options
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Per-test parameter tables, `[tests.<name>]`, handed to tests verbatim
    #[serde(default)]
    pub tests: BTreeMap<String, toml::Table>,

    /// Position estimator
    #[serde(default)]
    pub position: PositionConfig,

    /// Gear classifier
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Deployment phase labelling
    #[serde(default)]
    pub phase: PhaseConfig,

    /// Observation file reading
    #[serde(default)]
    pub input: InputConfig,

    /// Batch runner
    #[serde(default)]
    pub batch: BatchConfig,
}

impl QcConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FISHGEAR_QC_CONFIG` environment variable
    /// 2. `./qc_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded QC config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./qc_config.toml
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded QC config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| match e {
                ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
                other => other,
            })?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings and otherwise ignored.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let registry = TestRegistry::with_default_tests();

        // Two-pass: check for unknown keys first (warnings only)
        let typo_warnings = super::validation::validate_unknown_keys(contents, &registry);
        for w in &typo_warnings {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate_with(&registry)?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the config to a file (used to dump the effective defaults).
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "QC config saved");
        Ok(())
    }

    /// Validate against the built-in test catalog.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_with(&TestRegistry::with_default_tests())
    }

    /// Validate ranges, consistency and per-test parameters.
    ///
    /// All problems are collected; warnings are logged and do not fail.
    pub fn validate_with(&self, registry: &TestRegistry) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let p = &self.pipeline;
        if !p.default_latitude.is_finite() || !(-90.0..=90.0).contains(&p.default_latitude) {
            errors.push(format!(
                "pipeline.default_latitude ({}) must be within -90..90",
                p.default_latitude
            ));
        }

        let pos = &self.position;
        if !pos.surface_pressure.is_finite() {
            errors.push(format!(
                "position.surface_pressure must be finite (got {})",
                pos.surface_pressure
            ));
        }

        if self.classifier.return_grace_days < 0 {
            errors.push(format!(
                "classifier.return_grace_days ({}) cannot be negative",
                self.classifier.return_grace_days
            ));
        }

        if self.phase.profile_cutoff_secs <= 0 {
            errors.push(format!(
                "phase.profile_cutoff_secs ({}) must be > 0",
                self.phase.profile_cutoff_secs
            ));
        }

        let input = &self.input;
        if input.header_marker.trim().is_empty() {
            errors.push("input.header_marker cannot be empty".to_string());
        }
        if !input.reset_tolerance.is_finite() || input.reset_tolerance < 0.0 {
            errors.push(format!(
                "input.reset_tolerance ({}) must be a non-negative number",
                input.reset_tolerance
            ));
        }

        // Test selection and parameter tables
        let (selection_errors, selection_warnings) =
            super::validation::validate_test_selection(self, registry);
        errors.extend(selection_errors);
        for w in &selection_warnings {
            warn!("{}", w);
        }
        errors.extend(super::validation::validate_test_parameters(self, registry));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Pipeline
// ============================================================================

/// Which tests run in which pass, and what gets written out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Position-independent tests, in run order
    #[serde(default = "default_first_pass")]
    pub first_pass: Vec<String>,

    /// Position-dependent tests, in run order
    #[serde(default = "default_second_pass")]
    pub second_pass: Vec<String>,

    /// Keep every per-test flag column in the output
    #[serde(default = "default_true")]
    pub save_flags: bool,

    /// Emit depth (m) instead of pressure (dbar)
    #[serde(default)]
    pub convert_pressure_to_depth: bool,

    /// Latitude for depth conversion when no fix exists (degrees)
    #[serde(default = "default_latitude")]
    pub default_latitude: f64,
}

fn default_first_pass() -> Vec<String> {
    defaults::FIRST_PASS_TESTS.iter().map(|s| s.to_string()).collect()
}
fn default_second_pass() -> Vec<String> {
    defaults::SECOND_PASS_TESTS.iter().map(|s| s.to_string()).collect()
}
fn default_true() -> bool { true }
fn default_latitude() -> f64 { defaults::DEFAULT_LATITUDE }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            first_pass: default_first_pass(),
            second_pass: default_second_pass(),
            save_flags: true,
            convert_pressure_to_depth: false,
            default_latitude: default_latitude(),
        }
    }
}

// ============================================================================
// Position Estimator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionConfig {
    /// Only fixes shallower than this are averaged for stationary gear (dbar)
    #[serde(default = "default_surface_pressure")]
    pub surface_pressure: f64,

    /// First-pass tests a fix must pass to count as good
    #[serde(default = "default_good_fix_tests")]
    pub good_fix_tests: Vec<String>,

    /// Worst flag a good fix may carry under those tests
    #[serde(default = "default_good_flag_max")]
    pub good_flag_max: FlagValue,
}

fn default_surface_pressure() -> f64 { defaults::SURFACE_PRESSURE_DBAR }
fn default_good_fix_tests() -> Vec<String> {
    defaults::GOOD_FIX_TESTS.iter().map(|s| s.to_string()).collect()
}
fn default_good_flag_max() -> FlagValue {
    FlagValue::try_from(defaults::GOOD_FLAG_MAX).unwrap_or(FlagValue::ProbablyGood)
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            surface_pressure: default_surface_pressure(),
            good_fix_tests: default_good_fix_tests(),
            good_flag_max: default_good_flag_max(),
        }
    }
}

// ============================================================================
// Gear Classifier
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Fishing method (as recorded, case-insensitive) → gear class
    #[serde(default = "default_gear_methods")]
    pub gear_methods: BTreeMap<String, GearClass>,

    /// Days past the return date a deployment may still end
    #[serde(default = "default_return_grace_days")]
    pub return_grace_days: i64,

    /// Require the reporting deck unit to match the fisher record
    #[serde(default = "default_true")]
    pub check_deck_unit: bool,
}

pub fn default_gear_methods() -> BTreeMap<String, GearClass> {
    defaults::GEAR_METHODS
        .iter()
        .map(|(method, class)| (method.to_string(), *class))
        .collect()
}
fn default_return_grace_days() -> i64 { defaults::RETURN_GRACE_DAYS }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            gear_methods: default_gear_methods(),
            return_grace_days: default_return_grace_days(),
            check_deck_unit: true,
        }
    }
}

// ============================================================================
// Phase Labelling
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Gaps shorter than this label a reading as profiling (seconds)
    #[serde(default = "default_profile_cutoff")]
    pub profile_cutoff_secs: i64,
}

fn default_profile_cutoff() -> i64 { defaults::PROFILE_CUTOFF_SECS }

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            profile_cutoff_secs: default_profile_cutoff(),
        }
    }
}

// ============================================================================
// Observation Input
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// First cell of the column header row
    #[serde(default = "default_header_marker")]
    pub header_marker: String,

    /// chrono format of the timestamp column
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Temperature marking a sensor reset row (degC)
    #[serde(default = "default_reset_temperature")]
    pub reset_temperature: f64,

    #[serde(default = "default_reset_tolerance")]
    pub reset_tolerance: f64,

    /// chrono format of fisher metadata dates
    #[serde(default = "default_fisher_date_format")]
    pub fisher_date_format: String,
}

fn default_header_marker() -> String { defaults::HEADER_MARKER.to_string() }
fn default_timestamp_format() -> String { defaults::TIMESTAMP_FORMAT.to_string() }
fn default_reset_temperature() -> f64 { defaults::RESET_TEMPERATURE }
fn default_reset_tolerance() -> f64 { defaults::RESET_TOLERANCE }
fn default_fisher_date_format() -> String { defaults::FISHER_DATE_FORMAT.to_string() }

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            header_marker: default_header_marker(),
            timestamp_format: default_timestamp_format(),
            reset_temperature: default_reset_temperature(),
            reset_tolerance: default_reset_tolerance(),
            fisher_date_format: default_fisher_date_format(),
        }
    }
}

// ============================================================================
// Batch
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Worker threads; 0 uses one per CPU
    #[serde(default)]
    pub workers: usize,
}
