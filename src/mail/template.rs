use crate::config::MailConfig;
use crate::models::RunSummary;

const RULE: &str = "──────────────────────────────────────";

/// Plain-text report mail
#[derive(Clone, Debug)]
pub struct EmailTemplate {
    suite_name: String,
    passed: usize,
    total: usize,
    body: String,
}

impl EmailTemplate {
    pub fn new(summary: &RunSummary, config: &MailConfig, has_attachment: bool) -> Self {
        let attachments = if has_attachment {
            "• HTML report\n\nReport is attached for your review."
        } else {
            "No report attached; see the CI artifacts for details."
        };

        let mut signature = config.signature_name.clone();
        if let Some(title) = config.signature_title.as_deref().filter(|t| !t.is_empty()) {
            signature.push('\n');
            signature.push_str(title);
        }

        let body = format!(
            "Hello Team,

Below are the automation test results for build {build_version}:

{RULE}
Execution Summary
{RULE}

• Suite Name: {suite_name}
• Execution Date: {date}
• Duration: {duration}
• Branch: {branch}
• Triggered By: {triggered_by}

{RULE}
Test Statistics
{RULE}

• Total Tests: {total}
• Passed: {passed}
• Failed: {failed}
• Skipped: {skipped}
• Failure Rate: {failure_rate:.2}%

{RULE}
Attachments
{RULE}

{attachments}

Regards,
{signature}
",
            build_version = summary.build_version,
            suite_name = summary.suite_name,
            date = summary.execution_date(),
            duration = summary.duration_display(),
            branch = summary.branch,
            triggered_by = summary.triggered_by,
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            failure_rate = summary.failure_rate(),
        );

        Self {
            suite_name: summary.suite_name.clone(),
            passed: summary.passed,
            total: summary.total,
            body,
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "Test Report - {} | {}/{} Passed",
            self.suite_name, self.passed, self.total
        )
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
