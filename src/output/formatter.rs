//! Output formatters for pipeline results
//!
//! Provides table, JSON and one-line summary output.

use serde::Serialize;
use std::str::FromStr;

use crate::models::{StageResult, StageStatus, TestCaseResult, TestOutcome};
use crate::pipeline::{PipelineReport, StagePlan};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            "summary" => Ok(OutputFormat::Summary),
            other => Err(format!(
                "unknown format '{other}' (expected table, json, json-pretty or summary)"
            )),
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn json<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_default()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.colorize {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    /// Format a finished pipeline execution
    pub fn format_report(&self, report: &PipelineReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(report),
            OutputFormat::Summary => self.format_report_brief(report),
        }
    }

    fn format_result_line(&self, result: &TestCaseResult) -> String {
        let status = match result.outcome {
            TestOutcome::Passed => self.paint("✓ PASS", "32"),
            TestOutcome::Failed => self.paint("✗ FAIL", "31"),
            TestOutcome::Skipped => self.paint("○ SKIP", "33"),
        };
        let case = result
            .case_id
            .map(|id| format!("C{id}"))
            .unwrap_or_default();

        let mut line = format!(
            "  {} {:<50} {:>7} [{:>6}ms]",
            status,
            truncate(&format!("{}::{}", result.section, result.name), 50),
            case,
            result.duration_ms
        );
        if let (TestOutcome::Failed, Some(message)) = (result.outcome, &result.message) {
            line.push_str(&format!("\n      {}", truncate(first_line(message), 100)));
        }
        line
    }

    fn format_stage_line(&self, stage: &StageResult) -> String {
        let status = match stage.status {
            StageStatus::Succeeded => self.paint("✓ OK     ", "32"),
            StageStatus::Failed => self.paint("✗ FAILED ", "31"),
            StageStatus::Skipped => self.paint("○ SKIPPED", "33"),
        };
        format!(
            "  {:<9} {} {}",
            stage.stage.name(),
            status,
            truncate(&stage.message, 80)
        )
    }

    fn format_report_table(&self, report: &PipelineReport) -> String {
        let summary = &report.run.summary;
        let mut output = String::new();

        output.push_str("\n══════════════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " {} ({}) - {}\n",
            summary.suite_name, summary.build_version, summary.run_id
        ));
        output.push_str("══════════════════════════════════════════════════════════════════════\n");

        for result in &report.run.results {
            output.push_str(&self.format_result_line(result));
            output.push('\n');
        }

        output.push_str("──────────────────────────────────────────────────────────────────────\n");
        let failed = if summary.failed > 0 {
            self.paint(&summary.failed.to_string(), "31")
        } else {
            summary.failed.to_string()
        };
        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Skip: {}\n",
            summary.total,
            self.paint(&summary.passed.to_string(), "32"),
            failed,
            summary.skipped
        ));
        output.push_str(&format!(
            "  Pass Rate: {:.1}% | Duration: {}\n",
            summary.pass_rate(),
            summary.duration_display()
        ));
        output.push_str(&format!("  Report: {}\n", report.artifacts.html_report.display()));

        output.push_str("──────────────────────────────────────────────────────────────────────\n");
        output.push_str(" Stages\n");
        for stage in &report.stages {
            output.push_str(&self.format_stage_line(stage));
            output.push('\n');
        }

        output
    }

    fn format_report_brief(&self, report: &PipelineReport) -> String {
        let summary = &report.run.summary;
        let stages: Vec<String> = report
            .stages
            .iter()
            .map(|s| format!("{}={}", s.stage.name().to_lowercase(), s.status))
            .collect();
        format!(
            "{}: {}/{} passed ({:.1}%) in {} [{}]",
            summary.suite_name,
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.duration_display(),
            stages.join(" ")
        )
    }

    /// Format a resolved stage plan
    pub fn format_plan(&self, plan: &StagePlan) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(plan),
            OutputFormat::Summary => format!(
                "{} of {} stages enabled",
                plan.enabled_count(),
                plan.stages().len()
            ),
            OutputFormat::Table => {
                let mut output = String::from("Stage plan:\n");
                for line in plan.to_string().lines() {
                    output.push_str(&format!("  {line}\n"));
                }
                output
            }
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
