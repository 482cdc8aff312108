//! fishgear-qc - Quality control for fishing-gear sensor data
//!
//! Flags every reading of every deployment file with a 1-4 quality score,
//! writes QC'd CSV files and a JSON-lines status record per deployment.
//!
//! # Usage
//!
//! ```bash
//! # QC a directory of sensor files
//! fishgear-qc run --metadata fisher_metadata.csv --land coastline.json data/
//!
//! # List the test catalog
//! fishgear-qc tests
//!
//! # Validate a config file
//! fishgear-qc check-config qc_config.toml
//! ```
//!
//! # Environment Variables
//!
//! - `FISHGEAR_QC_CONFIG`: Path to the QC config (default: ./qc_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use fishgear_qc::config::{self, QcConfig};
use fishgear_qc::input::{self, ObservationReader, StatusWriter};
use fishgear_qc::{BatchRunner, DeploymentProcessor, TestRegistry};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fishgear-qc")]
#[command(about = "Quality control for fishing-gear temperature/pressure/position data")]
#[command(version)]
struct CliArgs {
    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// QC one or more deployment files (directories are searched for *.csv)
    Run {
        /// Fisher metadata CSV (serial numbers, supply/return dates, fishing method)
        #[arg(long, value_name = "CSV")]
        metadata: PathBuf,

        /// Coastline polygons (JSON) for the on-land test
        #[arg(long, value_name = "JSON")]
        land: Option<PathBuf>,

        /// QC config file (default: $FISHGEAR_QC_CONFIG, then ./qc_config.toml)
        #[arg(short, long, value_name = "TOML")]
        config: Option<PathBuf>,

        /// Directory for QC'd CSV files
        #[arg(long, default_value = "qc_output")]
        out_dir: PathBuf,

        /// Status file (default: <out-dir>/status.jsonl)
        #[arg(long)]
        status_file: Option<PathBuf>,

        /// Worker threads (overrides batch.workers; 0 = one per CPU)
        #[arg(long)]
        workers: Option<usize>,

        /// Deployment files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List the registered QC tests
    Tests,

    /// Validate a config file and report every problem found
    CheckConfig {
        path: PathBuf,

        /// Print the effective configuration after validation
        #[arg(long)]
        print: bool,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    match args.command {
        SubCommand::Run {
            metadata,
            land,
            config,
            out_dir,
            status_file,
            workers,
            files,
        } => {
            let qc_config = match config {
                Some(path) => QcConfig::load_from_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => QcConfig::load(),
            };
            let status_file = status_file.unwrap_or_else(|| out_dir.join("status.jsonl"));
            run(&qc_config, &metadata, land.as_deref(), &out_dir, &status_file, workers, &files)
        }
        SubCommand::Tests => {
            list_tests();
            Ok(())
        }
        SubCommand::CheckConfig { path, print } => check_config(&path, print),
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn run(
    qc_config: &QcConfig,
    metadata: &Path,
    land: Option<&Path>,
    out_dir: &Path,
    status_file: &Path,
    workers: Option<usize>,
    inputs: &[PathBuf],
) -> Result<()> {
    let fisher = input::read_fisher_metadata(metadata, &qc_config.input)
        .with_context(|| format!("Failed to read fisher metadata {}", metadata.display()))?;
    let land_mask = land
        .map(input::load_land_mask)
        .transpose()
        .context("Failed to load land mask")?;
    if land_mask.is_none() {
        warn!("No land mask given, position_on_land will not be applied");
    }

    let files = expand_inputs(inputs)?;
    info!(
        files = files.len(),
        fisher_records = fisher.len(),
        out_dir = %out_dir.display(),
        "Starting QC run"
    );

    let registry = TestRegistry::with_default_tests();
    let reader = ObservationReader::new(&qc_config.input).context("Failed to build observation reader")?;
    let processor = DeploymentProcessor::new(qc_config, &registry, &fisher, land_mask.as_ref());
    let runner = BatchRunner::new(processor, workers.unwrap_or(qc_config.batch.workers));

    let save_flags = qc_config.pipeline.save_flags;
    let report = runner.run(
        &files,
        |path| {
            reader
                .read_path(path)
                .map_err(|e| (input::deployment_id(path), e))
        },
        |outcome| match outcome.output() {
            Some(output) => input::write_qc_csv(out_dir, output, save_flags).map(|_| ()),
            None => Ok(()),
        },
    );

    let mut writer = StatusWriter::create(status_file)
        .with_context(|| format!("Failed to create status file {}", status_file.display()))?;
    writer.write_all(&report.statuses)?;
    writer.finish()?;

    println!(
        "Processed {} deployments: {} saved, {} rejected (all bad), {} failed",
        report.processed, report.succeeded, report.rejected, report.failed
    );
    Ok(())
}

/// Files are kept as given; directories contribute their *.csv files, sorted.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in inputs {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
                })
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn list_tests() {
    let registry = TestRegistry::with_default_tests();
    for test in registry.iter() {
        let pass = if config::defaults::FIRST_PASS_TESTS.contains(&test.name()) {
            "first"
        } else if config::defaults::SECOND_PASS_TESTS.contains(&test.name()) {
            "second"
        } else {
            "opt-in"
        };
        println!("{:<28} {:<7} {}", test.name(), pass, test.description());
    }
}

fn check_config(path: &Path, print: bool) -> Result<()> {
    let qc_config = QcConfig::load_from_file(path)
        .with_context(|| format!("Config {} is invalid", path.display()))?;
    println!("{}: OK", path.display());
    if print {
        print!("{}", qc_config.to_toml()?);
    }
    Ok(())
}
