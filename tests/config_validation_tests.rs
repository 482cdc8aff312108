//! Config Validation Tests
//!
//! Typo detection, test selection checks and parameter checks, exercised
//! through files on disk and the public validation entry points.

use fishgear_qc::config::validation::{
    suggest_correction, validate_test_parameters, validate_test_selection, validate_unknown_keys,
};
use fishgear_qc::config::{ConfigError, QcConfig};
use fishgear_qc::{GearClass, TestRegistry};

fn registry() -> TestRegistry {
    TestRegistry::with_default_tests()
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_section_key_warns_with_suggestion() {
    let toml_str = r#"
[position]
surface_presure = 6.0
"#;
    let warnings = validate_unknown_keys(toml_str, &registry());
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "position.surface_presure");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("position.surface_pressure"));
}

#[test]
fn typo_in_test_parameter_warns() {
    let toml_str = r#"
[tests.stuck_value]
rep_nmu = 6
"#;
    let warnings = validate_unknown_keys(toml_str, &registry());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("tests.stuck_value.rep_num"));
}

#[test]
fn gear_method_names_are_free_form() {
    let toml_str = r#"
[classifier.gear_methods]
"Crayfish potting" = "stationary"
"Beam trawl" = "mobile"
"#;
    assert!(validate_unknown_keys(toml_str, &registry()).is_empty());
    let config = QcConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.classifier.gear_methods["Crayfish potting"], GearClass::Stationary);
}

#[test]
fn suggestion_needs_small_edit_distance() {
    let known = ["spike", "stuck_value", "global_range"];
    assert_eq!(suggest_correction("spik", known).as_deref(), Some("spike"));
    assert_eq!(suggest_correction("completely_different", known), None);
}

// ============================================================================
// Test Selection & Parameters
// ============================================================================

#[test]
fn unknown_scheduled_test_is_a_warning_not_an_error() {
    let mut config = QcConfig::default();
    config.pipeline.first_pass.push("spikes".to_string());
    let (errors, warnings) = validate_test_selection(&config, &registry());
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("spike"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_in_both_passes_is_rejected() {
    let mut config = QcConfig::default();
    config.pipeline.second_pass.push("spike".to_string());
    match config.validate() {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("spike"));
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn malformed_test_parameters_are_reported_at_load() {
    let toml_str = r#"
[tests.stuck_value]
rep_num = 0

[tests.start_end_dist_check]
cutoffs = [2000.0, 500.0]

[tests.spike]
category = 7
"#;
    let err = QcConfig::from_toml_str(toml_str).unwrap_err();
    let ConfigError::Validation(errors) = err else {
        panic!("expected validation errors, got {err:?}");
    };
    assert_eq!(errors.len(), 3, "{errors:?}");
}

#[test]
fn default_parameters_pass_the_dry_run() {
    let mut config = QcConfig::default();
    for name in registry().names() {
        config.tests.insert(name.to_string(), toml::Table::new());
    }
    assert!(validate_test_parameters(&config, &registry()).is_empty());
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn saved_config_loads_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qc_config.toml");

    let mut config = QcConfig::default();
    config.position.surface_pressure = 7.5;
    config.pipeline.convert_pressure_to_depth = true;
    config.batch.workers = 3;
    config.save_to_file(&path).unwrap();

    let loaded = QcConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[pipeline\nsave_flags = true\n").unwrap();

    match QcConfig::load_from_file(&path) {
        Err(ConfigError::Parse(p, _)) => assert_eq!(p, path),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = QcConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_, _)));
}
