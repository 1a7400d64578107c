//! Artifact storage
//!
//! Every run writes three files into the output directory:
//! `report.html`, `report.json` and `test_summary.json`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::report::ReportGenerator;
use crate::models::{RunSummary, SuiteRun, TestCaseResult};

pub const HTML_REPORT: &str = "report.html";
pub const JSON_REPORT: &str = "report.json";
pub const SUMMARY_FILE: &str = "test_summary.json";

/// Machine-readable form of a suite run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredSuiteRun {
    pub run_id: String,
    pub suite_name: String,
    pub executed_at: DateTime<Utc>,

    /// Pass rate (0.0 - 100.0)
    pub pass_rate: f64,

    pub summary: RunSummary,
    pub tests: Vec<TestCaseResult>,
    pub environment: EnvironmentInfo,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredSuiteRun {
    pub fn from_run(run: &SuiteRun) -> Self {
        Self {
            run_id: run.summary.run_id.clone(),
            suite_name: run.summary.suite_name.clone(),
            executed_at: run.summary.executed_at,
            pass_rate: run.summary.pass_rate(),
            summary: run.summary.clone(),
            tests: run.results.clone(),
            environment: EnvironmentInfo::default(),
        }
    }
}

/// Paths of the files written for one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub html_report: PathBuf,
    pub json_report: PathBuf,
    pub summary: PathBuf,
}

/// Writes run artifacts into one directory
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Ensure the output directory exists
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create output directory {}", self.base_dir.display())
        })
    }

    /// Write all artifacts for a run
    pub fn save(&self, run: &SuiteRun) -> Result<ArtifactPaths> {
        self.ensure_dir()?;

        let paths = ArtifactPaths {
            html_report: self.base_dir.join(HTML_REPORT),
            json_report: self.base_dir.join(JSON_REPORT),
            summary: self.base_dir.join(SUMMARY_FILE),
        };

        let html = ReportGenerator::html(run);
        let mut writer = BufWriter::new(create(&paths.html_report)?);
        writer
            .write_all(html.as_bytes())
            .and_then(|_| writer.flush())
            .context("Failed to write HTML report")?;
        debug!("Wrote {}", paths.html_report.display());

        write_json(&paths.json_report, &StoredSuiteRun::from_run(run))?;
        write_json(&paths.summary, &run.summary)?;

        info!("Saved run artifacts to {}", self.base_dir.display());
        Ok(paths)
    }

}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(create(path)?);
    serde_json::to_writer_pretty(writer, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunLabels;
    use tempfile::tempdir;

    fn sample_run() -> SuiteRun {
        let results = vec![
            TestCaseResult::pass("Health", "ping", 12).with_case_id(Some(1)),
            TestCaseResult::fail("Orders", "create", 40, "expected status 201, got 500"),
            TestCaseResult::skip("Orders", "export", "retired"),
        ];
        let labels = RunLabels {
            suite_name: "Checkout API".to_string(),
            build_version: "1.4.2".to_string(),
            branch: "main".to_string(),
            triggered_by: "ci".to_string(),
        };
        let summary = RunSummary::from_results(labels, &results, Utc::now(), 0.2);
        SuiteRun::new(summary, results)
    }

    #[test]
    fn test_save_writes_all_artifacts() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("reports"));
        let run = sample_run();

        let paths = store.save(&run).unwrap();
        assert!(paths.html_report.exists());
        assert!(paths.json_report.exists());
        assert!(paths.summary.exists());

        let summary = fs::read_to_string(&paths.summary).unwrap();
        let loaded: RunSummary = serde_json::from_str(&summary).unwrap();
        assert_eq!(loaded.run_id, run.summary.run_id);
        assert_eq!(loaded.failed, 1);

        let json = fs::read_to_string(&paths.json_report).unwrap();
        let stored: StoredSuiteRun = serde_json::from_str(&json).unwrap();
        assert_eq!(stored.tests.len(), 3);
        assert_eq!(stored.tests[1].message.as_deref(), Some("expected status 201, got 500"));
        assert_eq!(stored.suite_name, "Checkout API");
    }

    #[test]
    fn test_unwritable_dir_is_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let store = ArtifactStore::new(blocker.join("reports"));
        assert!(store.save(&sample_run()).is_err());
    }
}
