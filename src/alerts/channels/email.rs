use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

use crate::alerts::error::ChannelError;
use crate::alerts::notifier::{NotificationChannel, Outgoing};
use crate::alerts::types::{AlertConfig, Level};

const GMAIL_SMTP_HOST: &str = "smtp.gmail.com";
const SUBMISSION_PORT: u16 = 587;
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Gmail channel: authenticated STARTTLS submission with an app password.
#[derive(Debug, Clone)]
pub struct EmailChannel {
    host: String,
    port: u16,
}

impl EmailChannel {
    pub fn new() -> Self {
        Self::with_relay(GMAIL_SMTP_HOST, SUBMISSION_PORT)
    }

    pub fn with_relay(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for EmailChannel {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn subject_for(level: Level) -> String {
    format!("[hostwatch] CPU {}", level.as_upper())
}

/// Assemble the plain-text message sent to every recipient at once.
fn build_message(
    from: &str,
    recipients: &[&str],
    level: Level,
    body: &str,
) -> Result<Message, ChannelError> {
    let mut builder = Message::builder()
        .from(from.parse::<Mailbox>()?)
        .subject(subject_for(level))
        .header(ContentType::TEXT_PLAIN);
    for recipient in recipients {
        builder = builder.to(recipient.parse::<Mailbox>()?);
    }

    builder
        .body(body.to_string())
        .map_err(|e| ChannelError::Build(e.to_string()))
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn is_enabled(&self, config: &AlertConfig) -> bool {
        config.email_enabled
    }

    #[instrument(skip_all, fields(level = %outgoing.level))]
    async fn send(&self, outgoing: &Outgoing<'_>) -> Result<(), ChannelError> {
        let from = outgoing.secrets.gmail_address.trim();
        let password = outgoing.secrets.gmail_app_password.trim();
        if from.is_empty() {
            return Err(ChannelError::MissingCredential("gmail_address"));
        }
        if password.is_empty() {
            return Err(ChannelError::MissingCredential("gmail_app_password"));
        }

        let recipients: Vec<&str> = outgoing
            .config
            .recipient_emails
            .iter()
            .map(|email| email.trim())
            .filter(|email| !email.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(ChannelError::NoRecipients("recipient_emails"));
        }

        let email = build_message(from, &recipients, outgoing.level, outgoing.message)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(from.to_string(), password.to_string()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        mailer.send(email).await?;

        debug!(recipients = recipients.len(), "alert email sent");
        Ok(())
    }
}
