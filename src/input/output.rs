//! Output writers: QC'd series CSV and the JSON-lines status file

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::InputError;
use crate::aggregate::OVERALL_FLAG;
use crate::pipeline::{DeploymentStatus, QcOutput};

const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Output file name for a deployment: `<stem>_qc.csv`.
pub fn qc_file_name(deployment_id: &str) -> String {
    let stem = Path::new(deployment_id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(deployment_id);
    format!("{stem}_qc.csv")
}

/// Write one QC'd deployment into `out_dir`.
///
/// Columns: time, position, pressure (or depth), temperature, phase, the
/// overall flag, one `QC_FLAG_<CATEGORY>` per category and, with
/// `save_flags`, every individual test column. Missing values are blank.
pub fn write_qc_csv(out_dir: &Path, output: &QcOutput, save_flags: bool) -> Result<PathBuf, InputError> {
    std::fs::create_dir_all(out_dir).map_err(|e| InputError::io(out_dir, e))?;
    let path = out_dir.join(qc_file_name(&output.deployment.id));
    let file = File::create(&path).map_err(|e| InputError::io(&path, e))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    let vertical = if output.depth.is_some() { "DEPTH" } else { "PRESSURE" };
    let mut header: Vec<String> = ["DATETIME", "LATITUDE", "LONGITUDE", vertical, "TEMPERATURE", "PHASE", OVERALL_FLAG]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(
        output
            .aggregate
            .categories
            .keys()
            .map(|c| format!("{OVERALL_FLAG}_{}", c.to_uppercase())),
    );
    if save_flags {
        header.extend(output.series.iter().map(|s| s.name.clone()));
    }
    writer.write_record(&header)?;

    for (i, o) in output.deployment.observations.iter().enumerate() {
        let vertical = match &output.depth {
            Some(depth) => depth[i],
            None => o.pressure,
        };
        let mut row = vec![
            o.timestamp.format(OUTPUT_TIMESTAMP_FORMAT).to_string(),
            number(o.latitude),
            number(o.longitude),
            number(vertical),
            number(o.temperature),
            output.phases[i].to_string(),
            output.aggregate.overall[i].to_string(),
        ];
        row.extend(output.aggregate.categories.values().map(|flags| flags[i].to_string()));
        if save_flags {
            row.extend(output.series.iter().map(|s| s.values[i].to_string()));
        }
        writer.write_record(&row)?;
    }

    writer.flush().map_err(|e| InputError::io(&path, e))?;
    debug!(path = %path.display(), rows = output.deployment.len(), "Wrote QC file");
    Ok(path)
}

fn number(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.6}")
    } else {
        String::new()
    }
}

/// Appends one JSON object per deployment to a status file.
pub struct StatusWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl StatusWriter {
    /// Create (or truncate) the status file.
    pub fn create(path: &Path) -> Result<Self, InputError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| InputError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| InputError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn write(&mut self, status: &DeploymentStatus) -> Result<(), InputError> {
        serde_json::to_writer(&mut self.writer, status)?;
        writeln!(self.writer).map_err(|e| InputError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    pub fn write_all<'s>(&mut self, statuses: impl IntoIterator<Item = &'s DeploymentStatus>) -> Result<(), InputError> {
        for status in statuses {
            self.write(status)?;
        }
        Ok(())
    }

    /// Flush and close, returning the number of records written.
    pub fn finish(mut self) -> Result<usize, InputError> {
        self.writer.flush().map_err(|e| InputError::io(&self.path, e))?;
        info!(path = %self.path.display(), records = self.written, "Wrote status file");
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::FlagAggregator;
    use crate::position::{Phase, PositionSummary};
    use crate::types::{Deployment, FlagSeries, FlagValue, GearClass, Observation};
    use chrono::{Duration, TimeZone, Utc};

    fn output(depth: bool) -> QcOutput {
        let t0 = Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap();
        let obs = vec![
            Observation::new(t0, -41.0, 173.5, 1.0, 13.0),
            Observation::new(t0 + Duration::minutes(10), f64::NAN, f64::NAN, 40.0, 12.5),
        ];
        let mut spike = FlagSeries::good("flag_spike_temp", "spike", "temperature", 2);
        spike.raise(1, FlagValue::Suspect);
        let series = vec![spike];
        let aggregate = FlagAggregator::new().aggregate(2, &series);
        QcOutput {
            deployment: Deployment::new("MOANA_2034_1.csv", obs),
            phases: vec![Phase::Profile, Phase::Deployed],
            depth: depth.then(|| vec![0.99, 39.6]),
            series,
            aggregate,
            position: PositionSummary {
                gear_class: GearClass::Mobile,
                good_fixes: 1,
                surface_fixes: 1,
                inferred: None,
                start_end_dist_m: None,
            },
            tests_applied: vec!["spike".to_string()],
            tests_not_applied: Vec::new(),
        }
    }

    #[test]
    fn test_qc_file_name() {
        assert_eq!(qc_file_name("MOANA_2034_1.csv"), "MOANA_2034_1_qc.csv");
        assert_eq!(qc_file_name("plain"), "plain_qc.csv");
    }

    #[test]
    fn test_write_qc_csv_with_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_qc_csv(dir.path(), &output(false), true).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "DATETIME,LATITUDE,LONGITUDE,PRESSURE,TEMPERATURE,PHASE,QC_FLAG,QC_FLAG_TEMPERATURE,flag_spike_temp"
        );
        assert_eq!(lines[1], "2021-02-01T00:00:00Z,-41.000000,173.500000,1.000000,13.000000,P,1,1,1");
        assert_eq!(lines[2], "2021-02-01T00:10:00Z,,,40.000000,12.500000,D,3,3,3");
    }

    #[test]
    fn test_write_qc_csv_depth_without_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_qc_csv(&dir.path().join("nested"), &output(true), false).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.contains("DEPTH"));
        assert!(!header.contains("flag_spike_temp"));
    }

    #[test]
    fn test_status_writer_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.jsonl");
        let mut writer = StatusWriter::create(&path).unwrap();
        let mut status = DeploymentStatus::new("a.csv");
        status.qc_1 = 5;
        writer.write_all([&status, &DeploymentStatus::new("b.csv")]).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["filename"], "a.csv");
        assert_eq!(first["qc=1"], 5);
    }
}
