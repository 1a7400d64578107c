//! Report notification
//!
//! Renders the plain-text summary mail and sends it over SMTP with the
//! HTML report attached.

mod mailer;
mod template;

pub use mailer::Mailer;
pub use template::EmailTemplate;

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::config::MailConfig;
use crate::models::SuiteRun;

/// Send the report mail, returning a short description of the delivery
pub async fn send_report(config: &MailConfig, run: &SuiteRun, html_report: Option<&Path>) -> Result<String> {
    let attachment = html_report.filter(|path| path.exists());
    let template = EmailTemplate::new(&run.summary, config, attachment.is_some());

    let mailer = Mailer::new(config)?;
    let message = mailer.build_message(&template.subject(), template.body(), attachment)?;
    mailer.send(message).await?;

    let recipients = config.recipient_list().join(", ");
    info!("Report email sent to: {}", recipients);
    Ok(format!("sent to {recipients}"))
}
