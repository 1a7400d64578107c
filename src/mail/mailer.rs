use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use tracing::debug;

use crate::config::MailConfig;

/// SMTP sender for report mails
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipients: Vec<Mailbox>,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let host = config
            .smtp_server
            .as_deref()
            .map(str::trim)
            .context("mail.smtp_server is not set")?;

        let sender = config
            .sender
            .as_deref()
            .context("mail.sender is not set")?
            .trim()
            .parse::<Mailbox>()
            .context("Invalid mail.sender address")?;

        let recipients = config
            .recipient_list()
            .iter()
            .map(|r| {
                r.parse::<Mailbox>()
                    .with_context(|| format!("Invalid recipient address '{r}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        if recipients.is_empty() {
            anyhow::bail!("mail.recipients is empty");
        }

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .with_context(|| format!("Failed to set up STARTTLS for {host}"))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        }
        .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
            recipients,
        })
    }

    /// Build the mail, attaching the file when given
    pub fn build_message(&self, subject: &str, body: &str, attachment: Option<&Path>) -> Result<Message> {
        let mut builder = Message::builder().from(self.sender.clone()).subject(subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
        if let Some(path) = attachment {
            let content = std::fs::read(path)
                .with_context(|| format!("Failed to read attachment {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report.html".to_string());
            parts = parts.singlepart(Attachment::new(filename).body(content, ContentType::TEXT_HTML));
        }

        builder.multipart(parts).context("Failed to build email")
    }

    pub async fn send(&self, message: Message) -> Result<()> {
        debug!("Sending mail to {} recipients", self.recipients.len());
        self.transport
            .send(message)
            .await
            .context("Failed to send email")?;
        Ok(())
    }
}
