//! Stage models
//!
//! Downstream stages, their run/skip policy and per-stage outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Downstream pipeline stage, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Database,
    TestRail,
    Email,
}

impl StageKind {
    pub fn all() -> Vec<StageKind> {
        vec![StageKind::Database, StageKind::TestRail, StageKind::Email]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Database => "Database",
            StageKind::TestRail => "TestRail",
            StageKind::Email => "Email",
        }
    }

    /// CLI flag that disables this stage
    pub fn disable_flag(&self) -> &'static str {
        match self {
            StageKind::Database => "--no-db",
            StageKind::TestRail => "--no-testrail",
            StageKind::Email => "--no-email",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Run/skip decision for a stage, resolved once before the pipeline starts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "reason", rename_all = "snake_case")]
pub enum StagePolicy {
    Enabled,
    Disabled(String),
    MissingConfig(String),
}

impl StagePolicy {
    pub fn is_enabled(&self) -> bool {
        matches!(self, StagePolicy::Enabled)
    }

    pub fn skip_reason(&self) -> Option<&str> {
        match self {
            StagePolicy::Enabled => None,
            StagePolicy::Disabled(reason) | StagePolicy::MissingConfig(reason) => Some(reason),
        }
    }
}

impl fmt::Display for StagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagePolicy::Enabled => write!(f, "enabled"),
            StagePolicy::Disabled(reason) => write!(f, "disabled ({reason})"),
            StagePolicy::MissingConfig(reason) => write!(f, "skip: {reason}"),
        }
    }
}

/// Stage execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Skipped,
    Succeeded,
    Failed,
}

impl StageStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            StageStatus::Skipped => "○",
            StageStatus::Succeeded => "✓",
            StageStatus::Failed => "✗",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Skipped => write!(f, "SKIPPED"),
            StageStatus::Succeeded => write!(f, "OK"),
            StageStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of one downstream stage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageKind,
    pub status: StageStatus,
    pub message: String,
    pub duration_ms: u64,
}

impl StageResult {
    pub fn skipped(stage: StageKind, reason: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            message: reason.into(),
            duration_ms: 0,
        }
    }

    pub fn succeeded(stage: StageKind, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            stage,
            status: StageStatus::Succeeded,
            message: message.into(),
            duration_ms,
        }
    }

    pub fn failed(stage: StageKind, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            message: error.into(),
            duration_ms,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

impl fmt::Display for StageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<9} {} [{}ms] - {}",
            self.status.symbol(),
            self.stage.name(),
            self.status,
            self.duration_ms,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(
            StageKind::all(),
            vec![StageKind::Database, StageKind::TestRail, StageKind::Email]
        );
    }

    #[test]
    fn test_policy_skip_reason() {
        assert!(StagePolicy::Enabled.is_enabled());
        assert_eq!(StagePolicy::Enabled.skip_reason(), None);
        assert_eq!(
            StagePolicy::MissingConfig("no [database] section".to_string()).skip_reason(),
            Some("no [database] section")
        );
    }

    #[test]
    fn test_stage_result_display() {
        let result = StageResult::failed(StageKind::Email, "connection refused", 12);
        assert!(result.is_failed());
        assert!(result.to_string().contains("FAILED"));
        assert!(result.to_string().contains("connection refused"));
    }
}
