//! System-wide default constants.
//!
//! Grouped by subsystem. Per-test parameter defaults live next to each test.

use crate::types::GearClass;

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "FISHGEAR_QC_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "qc_config.toml";

// ============================================================================
// Pipeline
// ============================================================================

/// Tests over the measured fixes, in run order. Gear class is already set.
pub const FIRST_PASS_TESTS: &[&str] = &[
    "timing_gap_test",
    "impossible_date",
    "impossible_location",
    "remove_ref_location",
    "position_on_land",
    "impossible_speed",
    "gear_type",
    "global_range",
    "spike",
    "stuck_value",
    "rate_of_change_test",
    "temperature_drift",
];

/// Tests that read the good-fix attributes the position estimator records,
/// in run order.
pub const SECOND_PASS_TESTS: &[&str] = &[
    "stationary_position_check",
    "start_end_dist_check",
];

/// Latitude used for depth conversion when no fix is available (degrees).
pub const DEFAULT_LATITUDE: f64 = -40.0;

// ============================================================================
// Position Estimator
// ============================================================================

/// Fixes at or deeper than this are not used for stationary averaging (dbar).
pub const SURFACE_PRESSURE_DBAR: f64 = 5.0;

/// First-pass tests whose flags decide whether a fix is good.
pub const GOOD_FIX_TESTS: &[&str] = &[
    "timing_gap_test",
    "impossible_date",
    "impossible_location",
    "position_on_land",
    "impossible_speed",
];

/// Worst flag a good fix may carry under each good-fix test (1-4).
pub const GOOD_FLAG_MAX: u8 = 2;

// ============================================================================
// Gear Classifier
// ============================================================================

/// Days after the recorded return date a deployment may still end.
///
/// 1 = the whole return day counts.
pub const RETURN_GRACE_DAYS: i64 = 1;

/// Fishing methods as recorded by fishers, and the gear class they imply.
pub const GEAR_METHODS: &[(&str, GearClass)] = &[
    ("Bottom trawl", GearClass::Mobile),
    ("Bottom trawling", GearClass::Mobile),
    ("Bottom trawler", GearClass::Mobile),
    ("Bottom long line", GearClass::Mobile),
    ("Trawling", GearClass::Mobile),
    ("Midwater trawl", GearClass::Mobile),
    ("Dredge", GearClass::Mobile),
    ("Trolling", GearClass::Mobile),
    ("Waka", GearClass::Mobile),
    ("Research", GearClass::Mobile),
    ("Education", GearClass::Mobile),
    ("Instrument deployment", GearClass::Mobile),
    ("Potting", GearClass::Stationary),
    ("Long lining", GearClass::Stationary),
    ("Potting, long lining", GearClass::Stationary),
    ("Purse seine netting", GearClass::Stationary),
    ("Danish seining", GearClass::Stationary),
    ("Netting", GearClass::Stationary),
    ("Set netting", GearClass::Stationary),
    ("Diving", GearClass::Stationary),
];

// ============================================================================
// Phase Labelling
// ============================================================================

/// Gaps shorter than this mean the sensor was profiling (seconds).
///
/// Sensors sample every few seconds in motion and every few minutes at rest.
pub const PROFILE_CUTOFF_SECS: i64 = 240;

// ============================================================================
// Observation Files
// ============================================================================

/// First cell of the column header row.
pub const HEADER_MARKER: &str = "DateTime (UTC)";

/// Timestamp format of the `DateTime (UTC)` column.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Temperature a sensor writes after a reset; the pressure column then
/// carries the reset code (degC).
pub const RESET_TEMPERATURE: f64 = 44.444;

/// Absolute tolerance for matching `RESET_TEMPERATURE` (degC).
pub const RESET_TOLERANCE: f64 = 0.001;

/// Date format of the fisher metadata `Date supplied`/`Date returned` columns.
pub const FISHER_DATE_FORMAT: &str = "%d/%m/%Y";
