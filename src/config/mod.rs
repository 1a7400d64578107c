//! Configuration module
//!
//! Handles loading and managing the pipeline configuration. The file has one
//! required section (`suite_info`) and three optional stage sections
//! (`database`, `mail`, `testrail`). A missing stage section, or one lacking
//! its required keys, only skips that stage.

mod env;
mod file;

pub use env::EnvConfig;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::models::RunLabels;

const MASK: &str = "********";

/// Pipeline configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Suite metadata and runner settings (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_info: Option<SuiteInfo>,

    /// Persistence stage settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    /// Notification stage settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<MailConfig>,

    /// Test-management sync settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testrail: Option<TestRailConfig>,
}

impl PipelineConfig {
    /// Copy of the configuration with every secret replaced
    pub fn masked(&self) -> Self {
        let mut config = self.clone();
        if let Some(db) = config.database.as_mut() {
            if db.password.is_some() {
                db.password = Some(MASK.to_string());
            }
            if let Some(url) = db.url.as_mut() {
                *url = mask_url_password(url);
            }
        }
        if let Some(mail) = config.mail.as_mut() {
            if mail.password.is_some() {
                mail.password = Some(MASK.to_string());
            }
        }
        if let Some(testrail) = config.testrail.as_mut() {
            if testrail.api_key.is_some() {
                testrail.api_key = Some(MASK.to_string());
            }
        }
        config
    }
}

/// Suite metadata and runner settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteInfo {
    /// Suite name shown in reports
    pub suite_name: String,

    /// Build or version label
    #[serde(default = "default_label")]
    pub build_version: String,

    /// Source branch
    #[serde(default = "default_label")]
    pub branch: String,

    /// Who or what triggered the run
    #[serde(default = "default_triggered_by")]
    pub triggered_by: String,

    /// Directory for generated artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// YAML suite definition for the built-in HTTP runner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_file: Option<PathBuf>,

    /// Base URL prepended to suite paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// External runner command (program followed by its arguments)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// JSON report written by the external runner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_report: Option<PathBuf>,

    /// Timeout for HTTP requests in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl SuiteInfo {
    pub fn new(suite_name: impl Into<String>) -> Self {
        Self {
            suite_name: suite_name.into(),
            build_version: default_label(),
            branch: default_label(),
            triggered_by: default_triggered_by(),
            output_dir: default_output_dir(),
            suite_file: None,
            base_url: None,
            command: None,
            runner_report: None,
            timeout_secs: default_timeout(),
        }
    }

    pub fn labels(&self) -> RunLabels {
        RunLabels {
            suite_name: self.suite_name.clone(),
            build_version: self.build_version.clone(),
            branch: self.branch.clone(),
            triggered_by: self.triggered_by.clone(),
        }
    }
}

/// Static column value for the summary row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Persistence stage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Full connection URL; takes precedence over the discrete fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// `mysql` or `sqlite`
    #[serde(default = "default_driver")]
    pub driver: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name, or file path for sqlite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Summary table
    #[serde(default = "default_table")]
    pub table: String,

    /// Optional per-test table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_table: Option<String>,

    /// Static columns added to every summary row
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_columns: BTreeMap<String, ColumnValue>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            driver: default_driver(),
            host: None,
            port: default_db_port(),
            user: None,
            password: None,
            database: None,
            table: default_table(),
            test_case_table: None,
            extra_columns: BTreeMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// Keys that must be present before a connection can be attempted
    pub fn missing_keys(&self) -> Vec<&'static str> {
        if self.url.is_some() {
            return Vec::new();
        }

        let mut missing = Vec::new();
        if is_blank(&self.database) {
            missing.push("database");
        }
        if self.driver.eq_ignore_ascii_case("sqlite") {
            return missing;
        }

        if is_blank(&self.host) {
            missing.push("host");
        }
        if is_blank(&self.user) {
            missing.push("user");
        }
        let local = self.host.as_deref() == Some("localhost");
        if !local && is_blank(&self.password) {
            missing.push("password");
        }
        missing
    }
}

/// Notification stage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_server: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Upgrade the connection with STARTTLS
    #[serde(default = "default_true", alias = "use-tls")]
    pub use_tls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Comma-separated recipient addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<String>,

    #[serde(default = "default_signature", alias = "your_name")]
    pub signature_name: String,

    #[serde(default, alias = "your_position", skip_serializing_if = "Option::is_none")]
    pub signature_title: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smtp_server: None,
            port: default_smtp_port(),
            username: None,
            password: None,
            use_tls: true,
            sender: None,
            recipients: None,
            signature_name: default_signature(),
            signature_title: None,
        }
    }
}

impl MailConfig {
    pub fn recipient_list(&self) -> Vec<String> {
        split_list(self.recipients.as_deref().unwrap_or_default())
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.smtp_server) {
            missing.push("smtp_server");
        }
        if is_blank(&self.sender) {
            missing.push("sender");
        }
        if self.recipient_list().is_empty() {
            missing.push("recipients");
        }
        missing
    }
}

/// Test-management sync configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestRailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Comma-separated case ids, `C` prefix optional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_ids: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_description: Option<String>,
}

impl Default for TestRailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            username: None,
            api_key: None,
            project_name: None,
            case_ids: None,
            suite_id: None,
            milestone_id: None,
            run_name: None,
            run_description: None,
        }
    }
}

impl TestRailConfig {
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.project_name) {
            missing.push("project_name");
        }
        if split_list(self.case_ids.as_deref().unwrap_or_default()).is_empty() {
            missing.push("case_ids");
        }
        if is_blank(&self.base_url) {
            missing.push("base_url");
        }
        if is_blank(&self.username) {
            missing.push("username");
        }
        if is_blank(&self.api_key) {
            missing.push("api_key");
        }
        missing
    }
}

/// Split a comma-separated list, dropping empty entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

fn mask_url_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some(MASK));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

fn default_true() -> bool {
    true
}

fn default_label() -> String {
    "N/A".to_string()
}

fn default_triggered_by() -> String {
    "Automation".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_timeout() -> u64 {
    30
}

fn default_driver() -> String {
    "mysql".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_table() -> String {
    "automation_run".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_signature() -> String {
    "QA Automation".to_string()
}
