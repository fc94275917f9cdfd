use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use splice_engine::AnalysisReport;

use crate::error::Result;

/// `<output_dir>/<stem>.report.json`
pub fn report_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".to_string());
    output_dir.join(format!("{stem}.report.json"))
}

pub fn write_report(path: &Path, report: &AnalysisReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Skipped,
}

/// Result of one input of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub input: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    pub spots: usize,
    pub spurious: usize,
    /// Checklist entries that did not pass
    pub failed_checks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn success(input: &Path, report_file: &Path, report: &AnalysisReport) -> Self {
        let failed_checks = match serde_json::to_value(&report.anomaly_report.checklist) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| v.as_str() == Some("FAIL"))
                .map(|(k, _)| k)
                .collect(),
            _ => Vec::new(),
        };
        Self {
            input: input.display().to_string(),
            status: Status::Ok,
            report: Some(report_file.display().to_string()),
            spots: report.ad_spots_by_pid.values().map(Vec::len).sum(),
            spurious: report.spurious_spots.values().map(Vec::len).sum(),
            failed_checks,
            error: None,
        }
    }

    pub fn failure(input: &Path, error: impl std::fmt::Display) -> Self {
        Self {
            input: input.display().to_string(),
            status: Status::Skipped,
            report: None,
            spots: 0,
            spurious: 0,
            failed_checks: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub files: Vec<FileOutcome>,
}

impl BatchSummary {
    /// Outcomes are listed in input path order.
    pub fn new(mut files: Vec<FileOutcome>) -> Self {
        files.sort_by(|a, b| a.input.cmp(&b.input));
        let skipped = files.iter().filter(|f| f.status == Status::Skipped).count();
        Self {
            succeeded: files.len() - skipped,
            skipped,
            files,
        }
    }

    pub fn all_failed(&self) -> bool {
        self.succeeded == 0 && self.skipped > 0
    }

    pub fn render(&self, json: bool) -> Result<String> {
        if json {
            return Ok(serde_json::to_string_pretty(self)?);
        }
        let mut out = String::new();
        for file in &self.files {
            match file.status {
                Status::Ok => {
                    out.push_str(&format!(
                        "OK    {} -> {} ({} spots, {} spurious)",
                        file.input,
                        file.report.as_deref().unwrap_or_default(),
                        file.spots,
                        file.spurious
                    ));
                    if !file.failed_checks.is_empty() {
                        out.push_str(&format!(" failed: {}", file.failed_checks.join(", ")));
                    }
                }
                Status::Skipped => out.push_str(&format!(
                    "SKIP  {}: {}",
                    file.input,
                    file.error.as_deref().unwrap_or_default()
                )),
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} analysed, {} skipped\n",
            self.succeeded, self.skipped
        ));
        Ok(out)
    }
}
