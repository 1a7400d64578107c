use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use sqlx::any::{AnyPoolOptions, AnyQueryResult};
use sqlx::{Any, AnyPool};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

use crate::config::{ColumnValue, DatabaseConfig};
use crate::models::{RunSummary, SuiteRun, TestOutcome};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Columns of the summary row, in insert order
pub const SUMMARY_COLUMNS: [&str; 10] = [
    "suite_name",
    "build_version",
    "total_tests",
    "passed",
    "failed",
    "skipped",
    "duration",
    "execution_date",
    "branch",
    "triggered_by",
];

/// Columns of the per-test rows, in insert order
pub const TEST_CASE_COLUMNS: [&str; 8] = [
    "automation_run_id",
    "test_case_id",
    "test_case_name",
    "test_case_status",
    "failure_reason",
    "test_start_time",
    "test_end_time",
    "recorded_at",
];

type AnyQuery<'q> = sqlx::query::Query<'q, Any, sqlx::any::AnyArguments<'q>>;

/// Build the connection URL from the database section
pub fn connection_url(config: &DatabaseConfig) -> Result<String> {
    if let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return Ok(url.trim().to_string());
    }

    let database = config
        .database
        .as_deref()
        .context("database.database is required")?;

    match config.driver.to_lowercase().as_str() {
        "sqlite" => Ok(format!("sqlite://{database}?mode=rwc")),
        "mysql" | "mariadb" => {
            let host = config.host.as_deref().context("database.host is required")?;
            let user = config.user.as_deref().context("database.user is required")?;

            let mut url = Url::parse(&format!("mysql://{}:{}", host.trim(), config.port))
                .with_context(|| format!("Invalid database host '{host}'"))?;
            url.set_username(user)
                .map_err(|_| anyhow::anyhow!("Invalid database user '{user}'"))?;
            if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
                url.set_password(Some(password))
                    .map_err(|_| anyhow::anyhow!("Invalid database password"))?;
            }
            url.set_path(database);
            Ok(url.to_string())
        }
        other => bail!("Unsupported database driver '{other}'"),
    }
}

/// Connection to the run tables
pub struct RunStore {
    pool: AnyPool,
    table: String,
    test_case_table: Option<String>,
    extra_columns: BTreeMap<String, ColumnValue>,
}

impl RunStore {
    /// Validate the table layout and open a single-connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        check_table_name(&config.table)?;
        if let Some(table) = &config.test_case_table {
            check_table_name(table)?;
        }
        for column in config.extra_columns.keys() {
            check_identifier(column)?;
            if SUMMARY_COLUMNS.contains(&column.as_str()) {
                bail!("extra column '{column}' collides with a summary column");
            }
        }

        let url = connection_url(config)?;
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .context("Failed to connect to database")?;
        debug!("Connected to {} database", config.driver);

        Ok(Self {
            pool,
            table: config.table.clone(),
            test_case_table: config.test_case_table.clone(),
            extra_columns: config.extra_columns.clone(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn records_test_cases(&self) -> bool {
        self.test_case_table.is_some()
    }

    /// Insert the summary row and return its id
    pub async fn insert_run(&self, summary: &RunSummary) -> Result<i64> {
        let columns: Vec<&str> = SUMMARY_COLUMNS
            .iter()
            .copied()
            .chain(self.extra_columns.keys().map(String::as_str))
            .collect();
        let sql = insert_sql(&self.table, &columns);

        let mut query = sqlx::query(&sql)
            .bind(summary.suite_name.clone())
            .bind(summary.build_version.clone())
            .bind(summary.total as i64)
            .bind(summary.passed as i64)
            .bind(summary.failed as i64)
            .bind(summary.skipped as i64)
            .bind(summary.duration_secs)
            .bind(summary.execution_date())
            .bind(summary.branch.clone())
            .bind(summary.triggered_by.clone());

        for value in self.extra_columns.values() {
            query = bind_column(query, value);
        }

        let result: AnyQueryResult = query
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert into {}", self.table))?;

        result
            .last_insert_id()
            .context("Database did not report the inserted run id")
    }

    /// Insert one row per test; start/end times run back to back from the
    /// run start
    pub async fn insert_test_cases(&self, run_id: i64, run: &SuiteRun) -> Result<usize> {
        let Some(table) = &self.test_case_table else {
            return Ok(0);
        };

        let sql = insert_sql(table, &TEST_CASE_COLUMNS);
        let recorded_at = Utc::now().format(DATE_FORMAT).to_string();
        let mut start = run.summary.executed_at;

        let mut tx = self.pool.begin().await?;
        for result in &run.results {
            let end = start + Duration::milliseconds(result.duration_ms as i64);
            let failure_reason = match result.outcome {
                TestOutcome::Failed => result.message.clone(),
                _ => None,
            };

            sqlx::query(&sql)
                .bind(run_id)
                .bind(result.node_id.clone())
                .bind(result.name.clone())
                .bind(result.outcome.as_str())
                .bind(failure_reason)
                .bind(start.format(DATE_FORMAT).to_string())
                .bind(end.format(DATE_FORMAT).to_string())
                .bind(recorded_at.clone())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert {} into {}", result.node_id, table))?;

            start = end;
        }
        tx.commit().await?;

        Ok(run.results.len())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    )
}

fn bind_column<'q>(query: AnyQuery<'q>, value: &ColumnValue) -> AnyQuery<'q> {
    match value {
        ColumnValue::Bool(b) => query.bind(*b),
        ColumnValue::Int(i) => query.bind(*i),
        ColumnValue::Float(f) => query.bind(*f),
        ColumnValue::Text(s) => query.bind(s.clone()),
    }
}

/// Table names may be schema qualified
fn check_table_name(name: &str) -> Result<()> {
    name.split('.').try_for_each(check_identifier)
}

fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        bail!("'{name}' is not a valid SQL identifier");
    }
    Ok(())
}
