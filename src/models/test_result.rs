//! Test result models
//!
//! Defines per-test results, the run summary and the suite run handed to
//! every downstream stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

impl TestOutcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "✓",
            TestOutcome::Failed => "✗",
            TestOutcome::Skipped => "○",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed => "failed",
            TestOutcome::Skipped => "skipped",
        }
    }

    /// Map a pytest-style outcome string
    pub fn from_report(outcome: &str) -> Option<Self> {
        match outcome.to_lowercase().as_str() {
            "passed" | "xpassed" => Some(TestOutcome::Passed),
            "failed" | "error" => Some(TestOutcome::Failed),
            "skipped" | "xfailed" => Some(TestOutcome::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => write!(f, "PASS"),
            TestOutcome::Failed => write!(f, "FAIL"),
            TestOutcome::Skipped => write!(f, "SKIP"),
        }
    }
}

/// Result of a single test execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Fully qualified test id (`section::name` for built-in suites)
    pub node_id: String,
    pub name: String,
    pub section: String,
    pub outcome: TestOutcome,
    pub duration_ms: u64,
    pub message: Option<String>,
    /// TestRail case id, if the test is linked to one
    pub case_id: Option<u64>,
}

impl TestCaseResult {
    pub fn new(section: impl Into<String>, name: impl Into<String>, outcome: TestOutcome) -> Self {
        let section = section.into();
        let name = name.into();
        Self {
            node_id: format!("{section}::{name}"),
            name,
            section,
            outcome,
            duration_ms: 0,
            message: None,
            case_id: None,
        }
    }

    pub fn pass(section: impl Into<String>, name: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(section, name, TestOutcome::Passed).with_duration(duration_ms)
    }

    pub fn fail(
        section: impl Into<String>,
        name: impl Into<String>,
        duration_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::new(section, name, TestOutcome::Failed)
            .with_duration(duration_ms)
            .with_message(message)
    }

    pub fn skip(section: impl Into<String>, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(section, name, TestOutcome::Skipped).with_message(reason)
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_case_id(mut self, case_id: Option<u64>) -> Self {
        self.case_id = case_id;
        self
    }
}

impl fmt::Display for TestCaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.outcome.symbol(),
            self.node_id,
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Descriptive labels attached to every run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLabels {
    pub suite_name: String,
    pub build_version: String,
    pub branch: String,
    pub triggered_by: String,
}

/// Summary of one suite execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub suite_name: String,
    pub build_version: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_secs: f64,
    pub executed_at: DateTime<Utc>,
    pub branch: String,
    pub triggered_by: String,
}

impl RunSummary {
    /// Build a summary by counting outcomes
    pub fn from_results(
        labels: RunLabels,
        results: &[TestCaseResult],
        executed_at: DateTime<Utc>,
        duration_secs: f64,
    ) -> Self {
        let count = |outcome: TestOutcome| results.iter().filter(|r| r.outcome == outcome).count();

        Self {
            run_id: generate_run_id(&executed_at),
            suite_name: labels.suite_name,
            build_version: labels.build_version,
            total: results.len(),
            passed: count(TestOutcome::Passed),
            failed: count(TestOutcome::Failed),
            skipped: count(TestOutcome::Skipped),
            duration_secs,
            executed_at,
            branch: labels.branch,
            triggered_by: labels.triggered_by,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    /// Failure percentage rounded to two decimals
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            ((self.failed as f64 / self.total as f64) * 10000.0).round() / 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Execution timestamp as stored in the database and shown in mail
    pub fn execution_date(&self) -> String {
        self.executed_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Human readable duration, e.g. `12.3s` or `2m 5.0s`
    pub fn duration_display(&self) -> String {
        let tenths = (self.duration_secs.max(0.0) * 10.0).round() as u64;
        let mins = tenths / 600;
        let secs = (tenths % 600) as f64 / 10.0;
        if mins > 0 {
            format!("{mins}m {secs:.1}s")
        } else {
            format!("{secs:.1}s")
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.suite_name, self.build_version)?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Skip: {}",
            self.total, self.passed, self.failed, self.skipped
        )?;
        write!(
            f,
            "Pass Rate: {:.1}% | Duration: {}",
            self.pass_rate(),
            self.duration_display()
        )
    }
}

/// A finished suite execution: the summary plus every test result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteRun {
    pub summary: RunSummary,
    pub results: Vec<TestCaseResult>,
}

impl SuiteRun {
    pub fn new(summary: RunSummary, results: Vec<TestCaseResult>) -> Self {
        Self { summary, results }
    }

    /// Results linked to a tracker case id
    pub fn results_for_case(&self, case_id: u64) -> impl Iterator<Item = &TestCaseResult> {
        self.results
            .iter()
            .filter(move |r| r.case_id == Some(case_id))
    }
}

/// Generate unique run ID
fn generate_run_id(executed_at: &DateTime<Utc>) -> String {
    let timestamp = executed_at.format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}
