//! External command runner
//!
//! Runs a test command that writes a pytest-json-report style file and
//! converts the report into test results.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::models::{TestCaseResult, TestOutcome};
use crate::suite::parse_case_id;

/// Results read back from the runner's report
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub results: Vec<TestCaseResult>,
    pub created: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub exit_code: Option<i32>,
    /// Collection or session errors not attached to any test
    pub session_errors: u64,
}

impl CommandOutput {
    /// Fail when the runner stopped abnormally without a failing test to show for it
    pub fn check_session(&self) -> Result<()> {
        if self.results.iter().any(|r| r.outcome == TestOutcome::Failed) {
            return Ok(());
        }
        if let Some(code) = self.exit_code.filter(|code| *code != 0) {
            bail!("runner exited with status {code} without reporting a failing test");
        }
        if self.session_errors > 0 {
            bail!(
                "runner reported {} session errors without a failing test",
                self.session_errors
            );
        }
        Ok(())
    }
}

/// Runs an external test command
#[derive(Clone, Debug)]
pub struct CommandRunner {
    command: Vec<String>,
    report_path: PathBuf,
}

impl CommandRunner {
    pub fn new(command: Vec<String>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            command,
            report_path: report_path.into(),
        }
    }

    /// Run the command and parse its report
    ///
    /// A non-zero exit status is expected when tests fail. A missing report, or
    /// a non-zero status with no failing test in the report, is an error.
    pub async fn run(&self) -> Result<CommandOutput> {
        let (program, args) = self
            .command
            .split_first()
            .context("runner command is empty")?;

        if self.report_path.exists() {
            std::fs::remove_file(&self.report_path).with_context(|| {
                format!("Failed to remove stale report {}", self.report_path.display())
            })?;
        }

        info!("Running {}", self.command.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .with_context(|| format!("Failed to start runner '{program}'"))?;

        if status.success() {
            debug!("Runner exited successfully");
        } else if status.code().is_none() {
            bail!("runner was terminated: {status}");
        } else {
            info!("Runner exited with {}", status);
        }

        let mut output = parse_report_file(&self.report_path)?;
        if let Some(code) = status.code() {
            output.exit_code = Some(code);
        }
        output.check_session()?;
        Ok(output)
    }
}

/// Parse a report file written by the runner
pub fn parse_report_file(path: &Path) -> Result<CommandOutput> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Runner report not found: {}", path.display()))?;
    parse_report(&content).with_context(|| format!("Invalid runner report: {}", path.display()))
}

pub fn parse_report(content: &str) -> Result<CommandOutput> {
    let report: RunnerReport = serde_json::from_str(content)?;

    let results = report.tests.iter().filter_map(RunnerTest::to_result).collect();
    let created = report
        .created
        .and_then(|ts| Utc.timestamp_millis_opt((ts * 1000.0) as i64).single());

    Ok(CommandOutput {
        results,
        created,
        duration_secs: report.duration,
        exit_code: report.exitcode,
        session_errors: report.summary.map_or(0, |summary| summary.error),
    })
}

#[derive(Debug, Deserialize)]
struct RunnerReport {
    created: Option<f64>,
    duration: Option<f64>,
    exitcode: Option<i32>,
    summary: Option<RunnerSummary>,
    #[serde(default)]
    tests: Vec<RunnerTest>,
}

#[derive(Debug, Deserialize)]
struct RunnerSummary {
    #[serde(default)]
    error: u64,
}

#[derive(Debug, Deserialize)]
struct RunnerTest {
    nodeid: String,
    outcome: String,
    setup: Option<RunnerPhase>,
    call: Option<RunnerPhase>,
    teardown: Option<RunnerPhase>,
}

#[derive(Debug, Deserialize)]
struct RunnerPhase {
    #[serde(default)]
    duration: f64,
    crash: Option<RunnerCrash>,
    longrepr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunnerCrash {
    message: Option<String>,
}

impl RunnerTest {
    /// `None` for outcomes that leave the test untested, e.g. `rerun`
    fn to_result(&self) -> Option<TestCaseResult> {
        let parts: Vec<&str> = self.nodeid.split("::").collect();

        // tests/test_cart.py::TestCart::test_add_item[chromium]
        let section = if parts.len() > 1 { parts[1] } else { "General" };
        let last = parts.last().copied().unwrap_or(self.nodeid.as_str());
        let name = last.split('[').next().unwrap_or(last);

        let Some(outcome) = TestOutcome::from_report(&self.outcome) else {
            warn!("Unknown outcome '{}' for {}, leaving it untested", self.outcome, self.nodeid);
            return None;
        };

        let duration_secs: f64 = [&self.setup, &self.call, &self.teardown]
            .iter()
            .filter_map(|phase| phase.as_ref())
            .map(|phase| phase.duration)
            .sum();

        let mut result = TestCaseResult::new(section, name, outcome)
            .with_node_id(&self.nodeid)
            .with_duration((duration_secs * 1000.0).round() as u64)
            .with_case_id(case_id_from_node(&self.nodeid));

        if let Some(message) = self.message(outcome) {
            result = result.with_message(message);
        }
        Some(result)
    }

    fn message(&self, outcome: TestOutcome) -> Option<String> {
        let failing_phase = [&self.call, &self.setup, &self.teardown]
            .into_iter()
            .filter_map(|phase| phase.as_ref())
            .find(|phase| phase.crash.is_some() || phase.longrepr.is_some());

        match outcome {
            TestOutcome::Passed => None,
            TestOutcome::Failed | TestOutcome::Skipped => failing_phase.and_then(|phase| {
                phase
                    .crash
                    .as_ref()
                    .and_then(|crash| crash.message.clone())
                    .or_else(|| phase.longrepr.clone())
            }),
        }
    }
}

/// Find a `C<digits>` token in a test node id
fn case_id_from_node(nodeid: &str) -> Option<u64> {
    nodeid
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() > 1 && (token.starts_with('C') || token.starts_with('c')))
        .find_map(parse_case_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const REPORT: &str = r#"{
        "created": 1760607000.5,
        "duration": 12.3,
        "exitcode": 1,
        "summary": {"passed": 1, "failed": 1, "skipped": 1, "total": 3},
        "tests": [
            {
                "nodeid": "tests/test_cart.py::TestCart::test_C101_add_item[chromium]",
                "outcome": "passed",
                "setup": {"duration": 0.1, "outcome": "passed"},
                "call": {"duration": 0.4, "outcome": "passed"},
                "teardown": {"duration": 0.0, "outcome": "passed"}
            },
            {
                "nodeid": "tests/test_cart.py::TestCart::test_remove_item",
                "outcome": "failed",
                "call": {
                    "duration": 1.2,
                    "outcome": "failed",
                    "crash": {"path": "tests/test_cart.py", "lineno": 40, "message": "AssertionError: 500 != 200"},
                    "longrepr": "long traceback"
                }
            },
            {
                "nodeid": "tests/test_health.py::test_ping",
                "outcome": "skipped",
                "setup": {"duration": 0.0, "outcome": "skipped", "longrepr": "Skipped: flaky"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_report() {
        let output = parse_report(REPORT).unwrap();
        assert_eq!(output.results.len(), 3);
        assert_eq!(output.duration_secs, Some(12.3));
        assert!(output.created.is_some());

        let first = &output.results[0];
        assert_eq!(first.section, "TestCart");
        assert_eq!(first.name, "test_C101_add_item");
        assert_eq!(first.outcome, TestOutcome::Passed);
        assert_eq!(first.duration_ms, 500);
        assert_eq!(first.case_id, Some(101));
        assert!(first.message.is_none());

        let second = &output.results[1];
        assert_eq!(second.outcome, TestOutcome::Failed);
        assert_eq!(second.message.as_deref(), Some("AssertionError: 500 != 200"));
        assert_eq!(second.case_id, None);

        let third = &output.results[2];
        assert_eq!(third.section, "test_ping");
        assert_eq!(third.outcome, TestOutcome::Skipped);
        assert_eq!(third.message.as_deref(), Some("Skipped: flaky"));
    }

    #[test]
    fn test_unknown_outcome_is_left_out() {
        let report = r#"{"tests": [
            {"nodeid": "tests/a.py::test_C1_one", "outcome": "rerun"},
            {"nodeid": "tests/a.py::test_C2_two", "outcome": "passed"}
        ]}"#;

        let output = parse_report(report).unwrap();
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.results[0].case_id, Some(2));
    }

    #[test]
    fn test_check_session() {
        let failing = parse_report(REPORT).unwrap();
        assert_eq!(failing.exit_code, Some(1));
        assert!(failing.check_session().is_ok());

        let collection_error = r#"{"exitcode": 2, "summary": {"error": 1, "total": 0}, "tests": []}"#;
        let output = parse_report(collection_error).unwrap();
        assert_eq!(output.session_errors, 1);
        let err = output.check_session().unwrap_err();
        assert!(err.to_string().contains("status 2"));

        let mut errors_only = parse_report(r#"{"summary": {"error": 3}, "tests": []}"#).unwrap();
        assert!(errors_only.check_session().is_err());
        errors_only.session_errors = 0;
        assert!(errors_only.check_session().is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_failures_is_error() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.json");
        let script = format!(
            r#"echo '{{"exitcode": 2, "summary": {{"error": 1, "total": 0}}, "tests": []}}' > '{}'; exit 2"#,
            report.display()
        );
        let runner = CommandRunner::new(
            vec!["sh".to_string(), "-c".to_string(), script],
            &report,
        );

        let err = runner.run().await.unwrap_err();
        assert!(err.to_string().contains("without reporting a failing test"));
    }

    #[test]
    fn test_case_id_from_node() {
        assert_eq!(case_id_from_node("tests/a.py::test_c55_login"), Some(55));
        assert_eq!(case_id_from_node("tests/a.py::test_login[C7]"), Some(7));
        assert_eq!(case_id_from_node("tests/case1.py::test_1"), None);
    }

    #[test]
    fn test_missing_report_is_error() {
        let dir = tempdir().unwrap();
        assert!(parse_report_file(&dir.path().join("absent.json")).is_err());
    }

    #[tokio::test]
    async fn test_unknown_program_is_error() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(
            vec!["qa-relay-no-such-runner".to_string()],
            dir.path().join("report.json"),
        );
        assert!(runner.run().await.is_err());
    }
}
