//! Config validation: unknown-key detection with Levenshtein suggestions,
//! test selection checks and per-test parameter checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use chrono::Utc;
use std::collections::{BTreeMap, HashSet};

use crate::qc::{QcContext, QcError, TestParams, TestRegistry};
use crate::types::DeploymentMetadata;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

/// Parameter key every test accepts.
const CATEGORY_KEY: &str = "category";

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the fixed dotted key paths of QcConfig.
///
/// Maintained manually to match the struct hierarchy in qc_config.rs.
/// `[tests.*]` keys come from the registry instead.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [pipeline]
        "pipeline",
        "pipeline.first_pass",
        "pipeline.second_pass",
        "pipeline.save_flags",
        "pipeline.convert_pressure_to_depth",
        "pipeline.default_latitude",
        // [tests]
        "tests",
        // [position]
        "position",
        "position.surface_pressure",
        "position.good_fix_tests",
        "position.good_flag_max",
        // [classifier]
        "classifier",
        "classifier.gear_methods",
        "classifier.return_grace_days",
        "classifier.check_deck_unit",
        // [phase]
        "phase",
        "phase.profile_cutoff_secs",
        // [input]
        "input",
        "input.header_marker",
        "input.timestamp_format",
        "input.reset_temperature",
        "input.reset_tolerance",
        "input.fisher_date_format",
        // [batch]
        "batch",
        "batch.workers",
    ];
    keys.iter().copied().collect()
}

/// Fixed keys plus `tests.<name>` and `tests.<name>.<param>` for every
/// registered test.
pub fn known_keys_with_tests(registry: &TestRegistry) -> HashSet<String> {
    let mut keys: HashSet<String> = known_config_keys().into_iter().map(String::from).collect();
    for test in registry.iter() {
        keys.insert(format!("tests.{}", test.name()));
        keys.insert(format!("tests.{}.{}", test.name(), CATEGORY_KEY));
        for param in test.parameter_names() {
            keys.insert(format!("tests.{}.{}", test.name(), param));
        }
    }
    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

/// Keys whose children are free-form data rather than config fields:
/// gear method names, and nested values inside a test parameter
/// (`tests.spike.variables.TEMPERATURE`).
fn is_free_form(key: &str) -> bool {
    key.starts_with("classifier.gear_methods.")
        || (key.starts_with("tests.") && key.split('.').count() > 3)
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties go to the alphabetically first candidate.
pub fn suggest_correction<'a, I>(unknown: &str, known: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, usize)> = None;
    for k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        best = match best {
            Some((bk, bd)) if bd < dist || (bd == dist && bk <= k) => Some((bk, bd)),
            _ => Some((k, dist)),
        };
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str, registry: &TestRegistry) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_keys_with_tests(registry);
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if known.contains(key.as_str()) || is_free_form(key) {
            continue;
        }
        let suggestion = suggest_correction(key, known.iter().map(String::as_str));
        warnings.push(ValidationWarning {
            field: key.clone(),
            message: format!("Unknown config key '{key}'"),
            suggestion,
        });
    }

    warnings
}

// ============================================================================
// Test Selection
// ============================================================================

/// Check the pass lists against the registry.
///
/// Returns (errors, warnings). Unknown test names are warnings: at run time
/// they are reported per deployment as "not applied".
pub fn validate_test_selection(
    config: &super::QcConfig,
    registry: &TestRegistry,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let names = registry.names();

    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    let passes = [
        ("pipeline.first_pass", &config.pipeline.first_pass),
        ("pipeline.second_pass", &config.pipeline.second_pass),
    ];
    for (field, list) in passes {
        for name in list.iter() {
            if let Some(previous) = seen.insert(name.as_str(), field) {
                errors.push(format!(
                    "{field}: test '{name}' is already scheduled in {previous}"
                ));
            }
            if !registry.contains(name) {
                warnings.push(ValidationWarning {
                    field: field.to_string(),
                    message: format!("{field}: unknown test '{name}'"),
                    suggestion: suggest_correction(name, names.iter().copied()),
                });
            }
        }
    }

    for gate in &config.position.good_fix_tests {
        if !config.pipeline.first_pass.contains(gate) {
            warnings.push(ValidationWarning {
                field: "position.good_fix_tests".to_string(),
                message: format!(
                    "position.good_fix_tests: '{gate}' is not in pipeline.first_pass and will not gate fixes"
                ),
                suggestion: None,
            });
        }
    }

    for name in config.tests.keys() {
        if registry.contains(name) && !seen.contains_key(name.as_str()) {
            warnings.push(ValidationWarning {
                field: format!("tests.{name}"),
                message: format!("tests.{name} is configured but not scheduled in either pass"),
                suggestion: None,
            });
        }
    }

    (errors, warnings)
}

// ============================================================================
// Test Parameters
// ============================================================================

/// Dry-run every configured test against an empty series so malformed
/// parameter tables are reported at load time rather than per deployment.
///
/// Only parameter errors count; anything that needs real data is ignored.
pub fn validate_test_parameters(config: &super::QcConfig, registry: &TestRegistry) -> Vec<String> {
    let metadata = DeploymentMetadata::default();
    let ctx = QcContext {
        deployment_id: "config",
        observations: &[],
        metadata: &metadata,
        run_time: Utc::now(),
        land: None,
    };

    let mut errors = Vec::new();
    for (name, table) in &config.tests {
        if !registry.contains(name) {
            continue;
        }
        if let Some(category) = table.get(CATEGORY_KEY) {
            if !category.is_str() {
                errors.push(format!("tests.{name}.{CATEGORY_KEY} must be a string"));
            }
        }
        let params = TestParams::new(table.clone());
        if let Err(QcError::InvalidParameter { message, .. }) = registry.apply_one(name, &ctx, &params) {
            errors.push(format!("tests.{name}: {message}"));
        }
    }
    errors
}
