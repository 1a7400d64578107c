//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::{DatabaseConfig, MailConfig, PipelineConfig, SuiteInfo, TestRailConfig};
use crate::pipeline::PipelineError;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./qa-relay.toml",
    "./config.toml",
    "./qa-relay.yaml",
    "~/.config/qa-relay/config.toml",
];

/// Supported file encodings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
    Json,
}

impl FileFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        }
    }
}

impl PipelineConfig {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Resolve the file to load: explicit path, then environment, then the
    /// standard locations
    pub fn locate(explicit: Option<&Path>, env_path: Option<&str>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = env_path {
            return Ok(expand_path(path));
        }
        Self::find().ok_or_else(|| {
            PipelineError::Config(format!(
                "no configuration file found (looked in {})",
                CONFIG_LOCATIONS.join(", ")
            ))
            .into()
        })
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content, FileFormat::from_path(path))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str, format: FileFormat) -> Result<Self> {
        let config: Self = match format {
            FileFormat::Toml => toml::from_str(content)?,
            FileFormat::Yaml => serde_yaml::from_str(content)?,
            FileFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match FileFormat::from_path(path) {
            FileFormat::Toml => toml::to_string_pretty(self).context("Failed to serialize config")?,
            FileFormat::Yaml => serde_yaml::to_string(self).context("Failed to serialize config")?,
            FileFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize config")?
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// The required `suite_info` section
    pub fn suite_info(&self) -> Result<&SuiteInfo, PipelineError> {
        self.suite_info
            .as_ref()
            .ok_or_else(|| PipelineError::Config("missing required [suite_info] section".into()))
    }

    /// Validate configuration
    ///
    /// Only `suite_info` problems are errors; stage sections are checked when
    /// the stage plan is resolved.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let info = self.suite_info()?;

        if info.suite_name.trim().is_empty() {
            return Err(PipelineError::Config("suite_info.suite_name is empty".into()));
        }

        match (&info.suite_file, &info.command) {
            (Some(_), Some(_)) => {
                return Err(PipelineError::Config(
                    "suite_info.suite_file and suite_info.command are mutually exclusive".into(),
                ))
            }
            (None, None) => {
                return Err(PipelineError::Config(
                    "suite_info needs either suite_file or command".into(),
                ))
            }
            (Some(_), None) => {
                if info.base_url.is_none() {
                    return Err(PipelineError::Config(
                        "suite_info.base_url is required with suite_file".into(),
                    ));
                }
            }
            (None, Some(command)) => {
                if command.is_empty() {
                    return Err(PipelineError::Config("suite_info.command is empty".into()));
                }
                if info.runner_report.is_none() {
                    return Err(PipelineError::Config(
                        "suite_info.runner_report is required with command".into(),
                    ));
                }
            }
        }

        if info.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "suite_info.timeout_secs must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut suite_info = SuiteInfo::new("Checkout API");
        suite_info.build_version = "1.4.2".to_string();
        suite_info.branch = "main".to_string();
        suite_info.triggered_by = "ci".to_string();
        suite_info.suite_file = Some(PathBuf::from("api_suite.yaml"));
        suite_info.base_url = Some("https://staging.example.com".to_string());

        Self {
            suite_info: Some(suite_info),
            database: Some(DatabaseConfig {
                host: Some("localhost".to_string()),
                user: Some("qa".to_string()),
                database: Some("qa_reports".to_string()),
                ..Default::default()
            }),
            mail: Some(MailConfig {
                smtp_server: Some("smtp.example.com".to_string()),
                username: Some("qa-bot@example.com".to_string()),
                sender: Some("qa-bot@example.com".to_string()),
                recipients: Some("team@example.com".to_string()),
                signature_title: Some("QA Engineer".to_string()),
                ..Default::default()
            }),
            testrail: Some(TestRailConfig {
                base_url: Some("https://example.testrail.io".to_string()),
                username: Some("qa-bot@example.com".to_string()),
                project_name: Some("Shop".to_string()),
                case_ids: Some("C101, C102".to_string()),
                ..Default::default()
            }),
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
