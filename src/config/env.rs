//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration. CI systems
//! usually know the build label and branch, and secrets are better kept out
//! of the configuration file.

use std::env;

use super::PipelineConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "QA_RELAY";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Config file from QA_RELAY_CONFIG
    pub config_file: Option<String>,
    /// Build label from QA_RELAY_BUILD_VERSION
    pub build_version: Option<String>,
    /// Branch from QA_RELAY_BRANCH
    pub branch: Option<String>,
    /// Trigger from QA_RELAY_TRIGGERED_BY
    pub triggered_by: Option<String>,
    /// Database password from QA_RELAY_DB_PASSWORD
    pub db_password: Option<String>,
    /// SMTP password from QA_RELAY_SMTP_PASSWORD
    pub smtp_password: Option<String>,
    /// TestRail API key from QA_RELAY_TESTRAIL_API_KEY
    pub testrail_api_key: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using a custom lookup, keyed by the full variable name
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.trim().is_empty())
        };

        Self {
            config_file: get("CONFIG"),
            build_version: get("BUILD_VERSION"),
            branch: get("BRANCH"),
            triggered_by: get("TRIGGERED_BY"),
            db_password: get("DB_PASSWORD"),
            smtp_password: get("SMTP_PASSWORD"),
            testrail_api_key: get("TESTRAIL_API_KEY"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.build_version.is_some()
            || self.branch.is_some()
            || self.triggered_by.is_some()
            || self.db_password.is_some()
            || self.smtp_password.is_some()
            || self.testrail_api_key.is_some()
    }

    /// Overlay values onto a loaded configuration
    ///
    /// Secrets only land in sections that already exist, so an override never
    /// turns on a stage by itself.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(info) = config.suite_info.as_mut() {
            if let Some(v) = &self.build_version {
                info.build_version = v.clone();
            }
            if let Some(v) = &self.branch {
                info.branch = v.clone();
            }
            if let Some(v) = &self.triggered_by {
                info.triggered_by = v.clone();
            }
        }
        if let (Some(db), Some(v)) = (config.database.as_mut(), &self.db_password) {
            db.password = Some(v.clone());
        }
        if let (Some(mail), Some(v)) = (config.mail.as_mut(), &self.smtp_password) {
            mail.password = Some(v.clone());
        }
        if let (Some(testrail), Some(v)) = (config.testrail.as_mut(), &self.testrail_api_key) {
            testrail.api_key = Some(v.clone());
        }
    }
}
