//! Stage plan
//!
//! Decides once, before anything runs, which downstream stages will run.
//! A stage's decision depends only on its disable flag, its `enabled` key
//! and the presence of its configuration.

use serde::Serialize;
use std::fmt;

use crate::config::PipelineConfig;
use crate::models::{StageKind, StagePolicy};

/// Stage disable flags from the command line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageFlags {
    pub no_db: bool,
    pub no_testrail: bool,
    pub no_email: bool,
}

impl StageFlags {
    #[cfg(test)]
    pub fn all_disabled() -> Self {
        Self {
            no_db: true,
            no_testrail: true,
            no_email: true,
        }
    }

    pub fn disables(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Database => self.no_db,
            StageKind::TestRail => self.no_testrail,
            StageKind::Email => self.no_email,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedStage {
    pub stage: StageKind,
    #[serde(flatten)]
    pub policy: StagePolicy,
}

/// Ordered stage decisions: database, TestRail, email
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StagePlan {
    stages: Vec<PlannedStage>,
}

impl StagePlan {
    pub fn resolve(config: &PipelineConfig, flags: &StageFlags) -> Self {
        let stages = StageKind::all()
            .into_iter()
            .map(|stage| PlannedStage {
                stage,
                policy: resolve_stage(stage, config, flags),
            })
            .collect();
        Self { stages }
    }

    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    #[cfg(test)]
    pub fn policy(&self, stage: StageKind) -> Option<&StagePolicy> {
        self.stages
            .iter()
            .find(|planned| planned.stage == stage)
            .map(|planned| &planned.policy)
    }

    pub fn enabled_count(&self) -> usize {
        self.stages.iter().filter(|p| p.policy.is_enabled()).count()
    }
}

impl fmt::Display for StagePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for planned in &self.stages {
            let symbol = if planned.policy.is_enabled() { "✓" } else { "○" };
            writeln!(f, "{} {:<9} {}", symbol, planned.stage.name(), planned.policy)?;
        }
        Ok(())
    }
}

fn resolve_stage(stage: StageKind, config: &PipelineConfig, flags: &StageFlags) -> StagePolicy {
    if flags.disables(stage) {
        return StagePolicy::Disabled(format!("{} given", stage.disable_flag()));
    }

    let (section, enabled, missing) = match stage {
        StageKind::Database => (
            "database",
            config.database.as_ref().map(|c| c.enabled),
            config.database.as_ref().map(|c| c.missing_keys()),
        ),
        StageKind::TestRail => (
            "testrail",
            config.testrail.as_ref().map(|c| c.enabled),
            config.testrail.as_ref().map(|c| c.missing_keys()),
        ),
        StageKind::Email => (
            "mail",
            config.mail.as_ref().map(|c| c.enabled),
            config.mail.as_ref().map(|c| c.missing_keys()),
        ),
    };

    match (enabled, missing) {
        (Some(false), _) => StagePolicy::Disabled(format!("{section}.enabled = false")),
        (Some(true), Some(keys)) if !keys.is_empty() => {
            let keys: Vec<String> = keys.iter().map(|k| format!("{section}.{k}")).collect();
            StagePolicy::MissingConfig(format!("missing {}", keys.join(", ")))
        }
        (Some(true), _) => StagePolicy::Enabled,
        (None, _) => StagePolicy::MissingConfig(format!("no [{section}] section")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, MailConfig, TestRailConfig};

    fn full_config() -> PipelineConfig {
        PipelineConfig {
            suite_info: None,
            database: Some(DatabaseConfig {
                driver: "sqlite".to_string(),
                database: Some("runs.db".to_string()),
                ..Default::default()
            }),
            mail: Some(MailConfig {
                smtp_server: Some("smtp.example.com".to_string()),
                sender: Some("qa@example.com".to_string()),
                recipients: Some("dev@example.com".to_string()),
                ..Default::default()
            }),
            testrail: Some(TestRailConfig {
                base_url: Some("https://example.testrail.io".to_string()),
                username: Some("qa@example.com".to_string()),
                api_key: Some("key".to_string()),
                project_name: Some("Shop".to_string()),
                case_ids: Some("C1,C2".to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_full_config_enables_everything() {
        let plan = StagePlan::resolve(&full_config(), &StageFlags::default());
        assert_eq!(plan.enabled_count(), 3);
        let order: Vec<_> = plan.stages().iter().map(|p| p.stage).collect();
        assert_eq!(
            order,
            vec![StageKind::Database, StageKind::TestRail, StageKind::Email]
        );
    }

    #[test]
    fn test_missing_database_section_is_skip() {
        let mut config = full_config();
        config.database = None;

        let plan = StagePlan::resolve(&config, &StageFlags::default());
        assert_eq!(
            plan.policy(StageKind::Database),
            Some(&StagePolicy::MissingConfig("no [database] section".to_string()))
        );
        assert!(plan.policy(StageKind::Email).unwrap().is_enabled());
    }

    #[test]
    fn test_testrail_without_case_ids_is_skip() {
        let mut config = full_config();
        if let Some(testrail) = config.testrail.as_mut() {
            testrail.case_ids = None;
        }

        let plan = StagePlan::resolve(&config, &StageFlags::default());
        let policy = plan.policy(StageKind::TestRail).unwrap();
        assert!(!policy.is_enabled());
        assert_eq!(policy.skip_reason(), Some("missing testrail.case_ids"));
    }

    #[test]
    fn test_disable_flag_wins_over_config() {
        let flags = StageFlags {
            no_db: true,
            ..Default::default()
        };
        let plan = StagePlan::resolve(&full_config(), &flags);
        assert_eq!(
            plan.policy(StageKind::Database),
            Some(&StagePolicy::Disabled("--no-db given".to_string()))
        );
        assert_eq!(plan.enabled_count(), 2);

        let plan = StagePlan::resolve(&full_config(), &StageFlags::all_disabled());
        assert_eq!(plan.enabled_count(), 0);
    }

    #[test]
    fn test_enabled_false_disables() {
        let mut config = full_config();
        if let Some(mail) = config.mail.as_mut() {
            mail.enabled = false;
        }
        let plan = StagePlan::resolve(&config, &StageFlags::default());
        assert_eq!(
            plan.policy(StageKind::Email),
            Some(&StagePolicy::Disabled("mail.enabled = false".to_string()))
        );
    }

    #[test]
    fn test_plan_display() {
        let mut config = full_config();
        config.database = None;
        let rendered = StagePlan::resolve(&config, &StageFlags::default()).to_string();
        assert!(rendered.contains("○ Database  skip: no [database] section"));
        assert!(rendered.contains("✓ Email     enabled"));
    }
}
