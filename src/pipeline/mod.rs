//! Run-summarize-dispatch pipeline
//!
//! Runs the suite, writes the artifacts, then hands the same read-only
//! [`SuiteRun`] to the database, TestRail and email stages in that order.
//! Stage failures are recorded and never stop later stages.

mod plan;

pub use plan::{StageFlags, StagePlan};

use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::executor::TestRunner;
use crate::models::{StageKind, StageResult, SuiteRun};
use crate::results::{ArtifactPaths, ArtifactStore};
use crate::utils::Timer;
use crate::{database, mail, testrail};

pub const EXIT_OK: i32 = 0;
pub const EXIT_TEST_FAILURES: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_STAGE_FAILED: i32 = 3;

/// Errors that stop the pipeline before any stage runs
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("test runner crashed: {0}")]
    RunnerCrashed(String),

    #[error("failed to write artifacts: {0}")]
    Artifacts(String),
}

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }
}

/// Everything one pipeline execution produced
#[derive(Clone, Debug, Serialize)]
pub struct PipelineReport {
    pub run: SuiteRun,
    pub artifacts: ArtifactPaths,
    pub stages: Vec<StageResult>,
}

impl PipelineReport {
    pub fn failed_stages(&self) -> impl Iterator<Item = &StageResult> {
        self.stages.iter().filter(|s| s.is_failed())
    }

    /// Test failures take precedence; stage failures only count with `strict`
    pub fn exit_code(&self, strict: bool) -> i32 {
        if self.run.summary.has_failures() {
            EXIT_TEST_FAILURES
        } else if strict && self.failed_stages().next().is_some() {
            EXIT_STAGE_FAILED
        } else {
            EXIT_OK
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    plan: StagePlan,
    output_dir: Option<PathBuf>,
}

impl Pipeline {
    /// Validate the configuration and resolve the stage plan
    pub fn new(config: PipelineConfig, flags: &StageFlags) -> Result<Self, PipelineError> {
        config.validate()?;
        let plan = StagePlan::resolve(&config, flags);
        Ok(Self {
            config,
            plan,
            output_dir: None,
        })
    }

    /// Override `suite_info.output_dir`
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        let info = self.config.suite_info()?;
        for planned in self.plan.stages() {
            info!("{} stage: {}", planned.stage, planned.policy);
        }

        let run = TestRunner::new(info.clone()).run().await?;

        let output_dir = self.output_dir.as_ref().unwrap_or(&info.output_dir);
        let artifacts = ArtifactStore::new(output_dir)
            .save(&run)
            .map_err(|e| PipelineError::Artifacts(format!("{e:#}")))?;

        let mut stages = Vec::with_capacity(self.plan.stages().len());
        for planned in self.plan.stages() {
            let result = match planned.policy.skip_reason() {
                Some(reason) => {
                    info!("Skipping {} stage: {}", planned.stage, reason);
                    StageResult::skipped(planned.stage, reason)
                }
                None => self.run_stage(planned.stage, &run, &artifacts).await,
            };
            stages.push(result);
        }

        Ok(PipelineReport {
            run,
            artifacts,
            stages,
        })
    }

    async fn run_stage(&self, stage: StageKind, run: &SuiteRun, artifacts: &ArtifactPaths) -> StageResult {
        info!("Running {} stage", stage);
        let timer = Timer::start(format!("{stage} stage"));
        let outcome = self.dispatch(stage, run, artifacts).await;
        let duration_ms = timer.stop();

        match outcome {
            Ok(message) => {
                info!("{} stage completed: {}", stage, message);
                StageResult::succeeded(stage, message, duration_ms)
            }
            Err(e) => {
                warn!("{} stage failed: {:#}", stage, e);
                StageResult::failed(stage, format!("{e:#}"), duration_ms)
            }
        }
    }

    async fn dispatch(&self, stage: StageKind, run: &SuiteRun, artifacts: &ArtifactPaths) -> anyhow::Result<String> {
        match stage {
            StageKind::Database => {
                let config = self.config.database.as_ref().context("no [database] section")?;
                database::persist_run(config, run).await
            }
            StageKind::TestRail => {
                let config = self.config.testrail.as_ref().context("no [testrail] section")?;
                let timeout_secs = self.config.suite_info()?.timeout_secs;
                testrail::sync_run(config, run, timeout_secs).await
            }
            StageKind::Email => {
                let config = self.config.mail.as_ref().context("no [mail] section")?;
                mail::send_report(config, run, Some(&artifacts.html_report)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, MailConfig, SuiteInfo, TestRailConfig};
    use crate::mail::EmailTemplate;
    use crate::models::{RunLabels, RunSummary, StageStatus, TestCaseResult};
    use chrono::Utc;
    use mockito::Matcher;
    use serde_json::json;
    use sqlx::any::AnyPoolOptions;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    /// Report with 7 passed, 2 failed and 1 skipped test over 12.3s
    fn write_fixed_report(path: &Path) {
        let mut tests = Vec::new();
        for i in 0..7 {
            tests.push(json!({
                "nodeid": format!("tests/test_cart.py::TestCart::test_C{}_pass", i + 1),
                "outcome": "passed",
                "call": {"duration": 1.0}
            }));
        }
        for i in 0..2 {
            tests.push(json!({
                "nodeid": format!("tests/test_cart.py::TestCart::test_fail_{i}"),
                "outcome": "failed",
                "call": {"duration": 1.0, "crash": {"message": "AssertionError"}}
            }));
        }
        tests.push(json!({
            "nodeid": "tests/test_cart.py::TestCart::test_skip",
            "outcome": "skipped",
            "setup": {"duration": 0.0, "longrepr": "Skipped: flaky"}
        }));

        let report = json!({"created": 1760607000.0, "duration": 12.3, "tests": tests});
        std::fs::write(path, report.to_string()).unwrap();
    }

    /// Suite whose command copies a prepared report into place
    fn command_suite(dir: &TempDir) -> SuiteInfo {
        let fixture = dir.path().join("fixture.json");
        write_fixed_report(&fixture);
        let report = dir.path().join("runner-report.json");

        let mut info = SuiteInfo::new("Checkout API");
        info.build_version = "1.4.2".to_string();
        info.branch = "main".to_string();
        info.triggered_by = "ci".to_string();
        info.output_dir = dir.path().join("reports");
        info.command = Some(vec![
            "cp".to_string(),
            fixture.display().to_string(),
            report.display().to_string(),
        ]);
        info.runner_report = Some(report);
        info
    }

    fn passing_http_suite(dir: &TempDir, base_url: &str) -> SuiteInfo {
        let suite_file = dir.path().join("suite.yaml");
        std::fs::write(&suite_file, "tests:\n  - name: health\n    path: /health\n").unwrap();

        let mut info = SuiteInfo::new("Smoke");
        info.output_dir = dir.path().join("reports");
        info.suite_file = Some(suite_file);
        info.base_url = Some(base_url.to_string());
        info.timeout_secs = 5;
        info
    }

    fn sqlite_database(dir: &TempDir) -> DatabaseConfig {
        DatabaseConfig {
            driver: "sqlite".to_string(),
            database: Some(dir.path().join("runs.db").display().to_string()),
            ..Default::default()
        }
    }

    fn unreachable_mail() -> MailConfig {
        MailConfig {
            smtp_server: Some("127.0.0.1".to_string()),
            port: 1,
            use_tls: false,
            sender: Some("qa@example.com".to_string()),
            recipients: Some("dev@example.com".to_string()),
            ..Default::default()
        }
    }

    fn testrail_at(base_url: &str) -> TestRailConfig {
        TestRailConfig {
            base_url: Some(base_url.to_string()),
            username: Some("qa@example.com".to_string()),
            api_key: Some("key".to_string()),
            project_name: Some("Shop".to_string()),
            case_ids: Some("C1,C2".to_string()),
            ..Default::default()
        }
    }

    async fn health_server() -> (mockito::ServerGuard, mockito::Mock) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .create_async()
            .await;
        (server, mock)
    }

    #[tokio::test]
    async fn test_fixed_summary_reaches_database_and_mail() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("runs.db");

        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE automation_run (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             suite_name TEXT, build_version TEXT, total_tests INTEGER, passed INTEGER, \
             failed INTEGER, skipped INTEGER, duration REAL, execution_date TEXT, \
             branch TEXT, triggered_by TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let config = PipelineConfig {
            suite_info: Some(command_suite(&dir)),
            database: Some(sqlite_database(&dir)),
            mail: Some(unreachable_mail()),
            testrail: None,
        };
        let pipeline = Pipeline::new(config.clone(), &StageFlags::default()).unwrap();
        let report = pipeline.run().await.unwrap();

        let summary = &report.run.summary;
        assert_eq!(
            (summary.total, summary.passed, summary.failed, summary.skipped),
            (10, 7, 2, 1)
        );
        assert_eq!(summary.duration_secs, 12.3);

        let statuses: Vec<_> = report.stages.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StageStatus::Succeeded, StageStatus::Skipped, StageStatus::Failed]
        );
        assert_eq!(report.exit_code(false), EXIT_TEST_FAILURES);
        assert_eq!(report.exit_code(true), EXIT_TEST_FAILURES);

        let row: (i64, i64, i64, i64, f64, String) = sqlx::query_as(
            "SELECT total_tests, passed, failed, skipped, duration, build_version FROM automation_run",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row, (10, 7, 2, 1, 12.3, "1.4.2".to_string()));
        pool.close().await;

        let mail_config = config.mail.unwrap();
        let template = EmailTemplate::new(summary, &mail_config, true);
        assert_eq!(template.subject(), "Test Report - Checkout API | 7/10 Passed");
        for line in [
            "• Total Tests: 10",
            "• Passed: 7",
            "• Failed: 2",
            "• Skipped: 1",
            "• Duration: 12.3s",
            "• Failure Rate: 20.00%",
        ] {
            assert!(template.body().contains(line), "missing {line}");
        }

        assert!(report.artifacts.html_report.exists());
        assert!(report.artifacts.summary.exists());
    }

    #[tokio::test]
    async fn test_missing_sections_skip_without_error() {
        let (server, _health) = health_server().await;
        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            suite_info: Some(passing_http_suite(&dir, &server.url())),
            ..Default::default()
        };

        let report = Pipeline::new(config, &StageFlags::default())
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(report
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Skipped));
        assert_eq!(report.stages[0].message, "no [database] section");
        assert_eq!(report.exit_code(true), EXIT_OK);
    }

    #[tokio::test]
    async fn test_testrail_without_case_ids_creates_no_run() {
        let (server, _health) = health_server().await;
        let mut testrail_server = mockito::Server::new_async().await;
        let any_call = testrail_server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let any_post = testrail_server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let mut testrail = testrail_at(&testrail_server.url());
        testrail.case_ids = Some(" ".to_string());
        let config = PipelineConfig {
            suite_info: Some(passing_http_suite(&dir, &server.url())),
            testrail: Some(testrail),
            ..Default::default()
        };

        let report = Pipeline::new(config, &StageFlags::default())
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(report.stages[1].stage, StageKind::TestRail);
        assert_eq!(report.stages[1].status, StageStatus::Skipped);
        any_call.assert_async().await;
        any_post.assert_async().await;
    }

    #[tokio::test]
    async fn test_all_stages_disabled_only_writes_artifacts() {
        let (server, _health) = health_server().await;
        let mut testrail_server = mockito::Server::new_async().await;
        let untouched = testrail_server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            suite_info: Some(passing_http_suite(&dir, &server.url())),
            database: Some(sqlite_database(&dir)),
            mail: Some(unreachable_mail()),
            testrail: Some(testrail_at(&testrail_server.url())),
        };

        let report = Pipeline::new(config, &StageFlags::all_disabled())
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(report
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Skipped && s.message.ends_with("given")));
        assert!(report.artifacts.html_report.exists());
        assert!(report.artifacts.json_report.exists());
        assert!(report.artifacts.summary.exists());
        assert!(!dir.path().join("runs.db").exists());
        untouched.assert_async().await;
        assert_eq!(report.exit_code(true), EXIT_OK);
    }

    #[tokio::test]
    async fn test_runner_crash_stops_pipeline() {
        let dir = tempdir().unwrap();
        let mut info = passing_http_suite(&dir, "http://127.0.0.1:1");
        info.suite_file = Some(dir.path().join("missing.yaml"));

        let config = PipelineConfig {
            suite_info: Some(info),
            database: Some(sqlite_database(&dir)),
            ..Default::default()
        };

        let err = Pipeline::new(config, &StageFlags::default())
            .unwrap()
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::RunnerCrashed(_)));
        assert_ne!(err.exit_code(), EXIT_OK);
        assert!(!dir.path().join("runs.db").exists());
        assert!(!dir.path().join("reports").exists());
    }

    #[test]
    fn test_missing_suite_info_is_config_error() {
        let result = Pipeline::new(PipelineConfig::default(), &StageFlags::default());
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_strict_exit_code() {
        let results = vec![TestCaseResult::pass("A", "one", 1)];
        let labels = RunLabels {
            suite_name: "Smoke".to_string(),
            build_version: "N/A".to_string(),
            branch: "N/A".to_string(),
            triggered_by: "Automation".to_string(),
        };
        let summary = RunSummary::from_results(labels, &results, Utc::now(), 0.1);
        let report = PipelineReport {
            run: SuiteRun::new(summary, results),
            artifacts: ArtifactPaths {
                html_report: PathBuf::from("reports/report.html"),
                json_report: PathBuf::from("reports/report.json"),
                summary: PathBuf::from("reports/test_summary.json"),
            },
            stages: vec![
                StageResult::succeeded(StageKind::Database, "inserted run 1", 3),
                StageResult::failed(StageKind::Email, "connection refused", 2),
            ],
        };

        assert_eq!(report.exit_code(false), EXIT_OK);
        assert_eq!(report.exit_code(true), EXIT_STAGE_FAILED);
        assert_eq!(report.failed_stages().count(), 1);
    }
}
