use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::client::{CaseResult, NewRun, ResultStatus, TestRailClient, TestRailError};
use crate::config::{split_list, TestRailConfig};
use crate::models::{SuiteRun, TestOutcome};
use crate::suite::parse_case_id;

/// Parse `testrail.case_ids`, keeping first-seen order
pub fn parse_case_ids(raw: &str) -> Result<Vec<u64>, TestRailError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for entry in split_list(raw) {
        let id = parse_case_id(&entry).ok_or_else(|| TestRailError::InvalidCaseId(entry.clone()))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// TestRail elapsed string, `None` below one second
pub fn format_elapsed(duration_ms: u64) -> Option<String> {
    let secs = duration_ms / 1000;
    match secs {
        0 => None,
        1..=59 => Some(format!("{secs}s")),
        _ if secs % 60 == 0 => Some(format!("{}m", secs / 60)),
        _ => Some(format!("{}m {}s", secs / 60, secs % 60)),
    }
}

/// One result per configured case that has at least one matching test
///
/// Failed wins over skipped, skipped over passed.
pub fn build_results(run: &SuiteRun, case_ids: &[u64]) -> Vec<CaseResult> {
    case_ids
        .iter()
        .filter_map(|&case_id| {
            let results: Vec<_> = run.results_for_case(case_id).collect();
            if results.is_empty() {
                return None;
            }

            let has = |outcome| results.iter().any(|r| r.outcome == outcome);
            let (status, notes_for) = if has(TestOutcome::Failed) {
                (ResultStatus::Failed, Some(TestOutcome::Failed))
            } else if has(TestOutcome::Skipped) {
                (ResultStatus::Blocked, Some(TestOutcome::Skipped))
            } else {
                (ResultStatus::Passed, None)
            };

            let comment = notes_for
                .map(|outcome| {
                    results
                        .iter()
                        .filter(|r| r.outcome == outcome)
                        .filter_map(|r| r.message.as_deref())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .filter(|c| !c.is_empty());

            let elapsed_ms = results.iter().map(|r| r.duration_ms).sum();

            Some(CaseResult {
                case_id,
                status_id: status.id(),
                comment,
                elapsed: format_elapsed(elapsed_ms),
                version: Some(run.summary.build_version.clone()),
            })
        })
        .collect()
}

/// Create the TestRail run and post the results
pub async fn sync_run(config: &TestRailConfig, run: &SuiteRun, timeout_secs: u64) -> Result<String> {
    let project_name = config
        .project_name
        .as_deref()
        .context("testrail.project_name is not set")?;
    let case_ids = parse_case_ids(config.case_ids.as_deref().unwrap_or_default())?;
    if case_ids.is_empty() {
        anyhow::bail!("testrail.case_ids contains no case ids");
    }

    let client = TestRailClient::new(
        config.base_url.as_deref().context("testrail.base_url is not set")?,
        config.username.as_deref().context("testrail.username is not set")?,
        config.api_key.as_deref().context("testrail.api_key is not set")?,
        timeout_secs,
    )?;

    let project = client.find_project(project_name).await?;
    info!("Found TestRail project '{}' (id {})", project.name, project.id);

    let new_run = NewRun {
        name: config
            .run_name
            .clone()
            .unwrap_or_else(|| format!("Automation Run - {}", run.summary.execution_date())),
        description: config.run_description.clone(),
        suite_id: config.suite_id,
        milestone_id: config.milestone_id,
        include_all: false,
        case_ids: case_ids.clone(),
    };
    let created = client.add_run(project.id, &new_run).await?;
    info!(
        "Created TestRail run R{} '{}' with {} cases",
        created.id,
        created.name,
        case_ids.len()
    );

    let results = build_results(run, &case_ids);
    let unmatched = case_ids.len() - results.len();
    if unmatched > 0 {
        warn!("{} configured cases have no matching test result", unmatched);
    }

    if results.is_empty() {
        return Ok(format!("created run R{}, no results to post", created.id));
    }

    for result in &results {
        let status = ResultStatus::from_id(result.status_id).map_or("Unknown", ResultStatus::name);
        debug!("C{} -> {}", result.case_id, status);
    }
    client.add_results_for_cases(created.id, &results).await?;

    match client.get_run(created.id).await {
        Ok(summary) => {
            info!(
                "TestRail run R{}: {} passed, {} failed, {} untested",
                summary.id,
                summary.passed_count.unwrap_or_default(),
                summary.failed_count.unwrap_or_default(),
                summary.untested_count.unwrap_or_default()
            );
            if let Some(url) = &summary.url {
                info!("TestRail run: {}", url);
            }
        }
        Err(e) => warn!("Results posted, but reading run R{} back failed: {}", created.id, e),
    }

    Ok(format!(
        "created run R{}, posted {} of {} case results",
        created.id,
        results.len(),
        case_ids.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunLabels, RunSummary, TestCaseResult};
    use chrono::Utc;
    use mockito::Matcher;

    fn run(results: Vec<TestCaseResult>) -> SuiteRun {
        let labels = RunLabels {
            suite_name: "Checkout API".to_string(),
            build_version: "1.4.2".to_string(),
            branch: "main".to_string(),
            triggered_by: "ci".to_string(),
        };
        let summary = RunSummary::from_results(labels, &results, Utc::now(), 3.0);
        SuiteRun::new(summary, results)
    }

    fn config(base_url: &str) -> TestRailConfig {
        TestRailConfig {
            base_url: Some(base_url.to_string()),
            username: Some("qa@example.com".to_string()),
            api_key: Some("secret".to_string()),
            project_name: Some("Shop".to_string()),
            case_ids: Some("C1, C2, 3".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_case_ids() {
        assert_eq!(parse_case_ids("C1, c2,3, C1,").unwrap(), vec![1, 2, 3]);
        assert!(parse_case_ids("").unwrap().is_empty());
        assert!(matches!(
            parse_case_ids("C1, T2"),
            Err(TestRailError::InvalidCaseId(id)) if id == "T2"
        ));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(999), None);
        assert_eq!(format_elapsed(1500), Some("1s".to_string()));
        assert_eq!(format_elapsed(120_000), Some("2m".to_string()));
        assert_eq!(format_elapsed(65_400), Some("1m 5s".to_string()));
    }

    #[test]
    fn test_build_results_precedence() {
        let run = run(vec![
            TestCaseResult::pass("A", "one", 400).with_case_id(Some(1)),
            TestCaseResult::fail("A", "two", 800, "boom").with_case_id(Some(1)),
            TestCaseResult::skip("B", "three", "flaky").with_case_id(Some(2)),
            TestCaseResult::pass("B", "four", 2000).with_case_id(Some(2)),
            TestCaseResult::pass("C", "five", 10).with_case_id(Some(3)),
        ]);

        let results = build_results(&run, &[1, 2, 3, 4]);
        assert_eq!(results.len(), 3);

        assert_eq!(results[0].case_id, 1);
        assert_eq!(results[0].status_id, 5);
        assert_eq!(results[0].comment.as_deref(), Some("boom"));
        assert_eq!(results[0].elapsed.as_deref(), Some("1s"));
        assert_eq!(results[0].version.as_deref(), Some("1.4.2"));

        assert_eq!(results[1].status_id, 2);
        assert_eq!(results[1].comment.as_deref(), Some("flaky"));
        assert_eq!(results[1].elapsed.as_deref(), Some("2s"));

        assert_eq!(results[2].status_id, 1);
        assert_eq!(results[2].comment, None);
        assert_eq!(results[2].elapsed, None);
    }

    #[tokio::test]
    async fn test_sync_creates_run_and_posts_batch() {
        let mut server = mockito::Server::new_async().await;
        let projects = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Regex("get_projects$".into()))
            .with_status(200)
            .with_body(r#"{"projects": [{"id": 4, "name": "Shop"}]}"#)
            .create_async()
            .await;
        let add_run = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Regex("add_run/4$".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "include_all": false,
                "case_ids": [1, 2, 3]
            })))
            .with_status(200)
            .with_body(r#"{"id": 77, "name": "Automation Run"}"#)
            .expect(1)
            .create_async()
            .await;
        let add_results = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Regex("add_results_for_cases/77$".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "results": [
                    {"case_id": 1, "status_id": 1, "version": "1.4.2"},
                    {"case_id": 2, "status_id": 5, "comment": "500 != 200"}
                ]
            })))
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let _get_run = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Regex("get_run/77$".into()))
            .with_status(200)
            .with_body(r#"{"id": 77, "name": "Automation Run", "url": "https://tr/runs/view/77"}"#)
            .create_async()
            .await;

        let run = run(vec![
            TestCaseResult::pass("A", "one", 10).with_case_id(Some(1)),
            TestCaseResult::fail("A", "two", 10, "500 != 200").with_case_id(Some(2)),
        ]);

        let message = sync_run(&config(&server.url()), &run, 5).await.unwrap();
        assert_eq!(message, "created run R77, posted 2 of 3 case results");

        projects.assert_async().await;
        add_run.assert_async().await;
        add_results.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_lookup_failure_after_posting_is_not_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _projects = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Regex("get_projects$".into()))
            .with_status(200)
            .with_body(r#"{"projects": [{"id": 4, "name": "Shop"}]}"#)
            .create_async()
            .await;
        let _add_run = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Regex("add_run/4$".into()))
            .with_status(200)
            .with_body(r#"{"id": 78, "name": "Automation Run"}"#)
            .create_async()
            .await;
        let add_results = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Regex("add_results_for_cases/78$".into()))
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let get_run = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Regex("get_run/78$".into()))
            .with_status(500)
            .with_body(r#"{"error": "unavailable"}"#)
            .expect(1)
            .create_async()
            .await;

        let run = run(vec![TestCaseResult::pass("A", "one", 10).with_case_id(Some(1))]);

        let message = sync_run(&config(&server.url()), &run, 5).await.unwrap();
        assert_eq!(message, "created run R78, posted 1 of 3 case results");

        add_results.assert_async().await;
        get_run.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_project_fails() {
        let mut server = mockito::Server::new_async().await;
        let _projects = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Regex("get_projects$".into()))
            .with_status(200)
            .with_body(r#"[{"id": 1, "name": "Other"}]"#)
            .create_async()
            .await;
        let add_run = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = sync_run(&config(&server.url()), &run(Vec::new()), 5)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("project 'Shop' not found"));
        add_run.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_case_ids_fail_before_network() {
        let mut cfg = config("http://127.0.0.1:1");
        cfg.case_ids = Some("C1, nope".to_string());

        let err = sync_run(&cfg, &run(Vec::new()), 5).await.unwrap_err();
        assert!(err.to_string().contains("invalid case id 'nope'"));
    }
}
