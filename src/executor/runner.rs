//! Test execution runner
//!
//! Executes the configured suite and produces the run summary.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::{error, info};

use super::command::CommandRunner;
use crate::config::SuiteInfo;
use crate::http::HttpClient;
use crate::models::{RunSummary, SuiteRun, TestCaseResult};
use crate::pipeline::PipelineError;
use crate::suite::{SuiteDefinition, SuiteTest};
use crate::utils::Timer;

/// Test runner for the configured suite
pub struct TestRunner {
    info: SuiteInfo,
}

impl TestRunner {
    /// Create a new test runner
    pub fn new(info: SuiteInfo) -> Self {
        Self { info }
    }

    /// Run the suite
    ///
    /// Failing tests are part of the result. An error means no summary could
    /// be produced at all.
    pub async fn run(&self) -> Result<SuiteRun, PipelineError> {
        info!("Starting suite '{}'", self.info.suite_name);

        let executed_at = Utc::now();
        let timer = Timer::start("suite");

        let outcome = match (&self.info.suite_file, &self.info.command) {
            (Some(suite_file), _) => self
                .run_http_suite(suite_file)
                .await
                .map(|results| (results, executed_at, timer.elapsed_secs())),
            (None, Some(command)) => self.run_command(command).await.map(|output| {
                (
                    output.results,
                    output.created.unwrap_or(executed_at),
                    output.duration_secs.unwrap_or_else(|| timer.elapsed_secs()),
                )
            }),
            (None, None) => Err(anyhow::anyhow!("no suite_file or command configured")),
        };

        let (results, executed_at, duration_secs) = outcome.map_err(|e| {
            error!("Test runner crashed: {:#}", e);
            PipelineError::RunnerCrashed(format!("{e:#}"))
        })?;

        let summary =
            RunSummary::from_results(self.info.labels(), &results, executed_at, duration_secs);

        info!(
            "Suite completed in {} - Pass: {}/{} ({:.1}%)",
            summary.duration_display(),
            summary.passed,
            summary.total,
            summary.pass_rate()
        );

        Ok(SuiteRun::new(summary, results))
    }

    async fn run_http_suite(&self, suite_file: &Path) -> Result<Vec<TestCaseResult>> {
        let suite = SuiteDefinition::load(suite_file)?;
        let base_url = self
            .info
            .base_url
            .as_deref()
            .context("suite_info.base_url is required with suite_file")?;

        let client = HttpClient::new(base_url, self.info.timeout_secs)?;

        let mut results = Vec::with_capacity(suite.tests.len());
        for test in &suite.tests {
            let result = self.run_test(&client, &suite, test).await;
            info!("  {}", result);
            results.push(result);
        }
        Ok(results)
    }

    /// Run a single suite test
    pub async fn run_test(
        &self,
        client: &HttpClient,
        suite: &SuiteDefinition,
        test: &SuiteTest,
    ) -> TestCaseResult {
        if test.skip {
            let reason = test
                .skip_reason
                .clone()
                .unwrap_or_else(|| "Skipped by suite".to_string());
            return TestCaseResult::skip(&test.section, &test.name, reason)
                .with_case_id(test.case_id);
        }

        let request = test.to_request(&suite.default_headers);
        let timer = Timer::start(test.node_id());

        let result = match client.send(&request).await {
            Ok(response) => {
                let failures = test.expect.check(&response);
                if failures.is_empty() {
                    TestCaseResult::pass(&test.section, &test.name, response.duration_ms)
                } else {
                    TestCaseResult::fail(
                        &test.section,
                        &test.name,
                        response.duration_ms,
                        failures.join("; "),
                    )
                }
            }
            Err(e) => TestCaseResult::fail(&test.section, &test.name, timer.elapsed_ms(), e.to_string()),
        };

        result.with_case_id(test.case_id)
    }

    async fn run_command(&self, command: &[String]) -> Result<super::command::CommandOutput> {
        let report = self
            .info
            .runner_report
            .as_ref()
            .context("suite_info.runner_report is required with command")?;

        CommandRunner::new(command.to_vec(), report).run().await
    }
}
