use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::alerts::error::ChannelError;
use crate::alerts::notifier::{NotificationChannel, Outgoing};
use crate::alerts::types::AlertConfig;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram bot API channel.
///
/// One `sendMessage` request per chat id. Any failed request fails the whole
/// attempt, so a retry re-sends to every chat.
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    client: Client,
    api_base: String,
}

impl TelegramChannel {
    pub fn new() -> Result<Self, ChannelError> {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Point the channel at another bot API host.
    ///
    /// Fails when the HTTP client cannot be built, e.g. when no TLS backend
    /// can be initialised.
    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self, ChannelError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn is_enabled(&self, config: &AlertConfig) -> bool {
        config.telegram_enabled
    }

    #[instrument(skip_all, fields(level = %outgoing.level))]
    async fn send(&self, outgoing: &Outgoing<'_>) -> Result<(), ChannelError> {
        let token = outgoing.secrets.telegram_bot_token.trim();
        if token.is_empty() {
            return Err(ChannelError::MissingCredential("telegram token"));
        }

        let chat_ids: Vec<&str> = outgoing
            .config
            .telegram_chat_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        if chat_ids.is_empty() {
            return Err(ChannelError::NoRecipients("telegram chat_ids"));
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        for chat_id in chat_ids {
            let payload = SendMessage {
                chat_id,
                text: outgoing.message,
            };

            // The URL carries the bot token, keep it out of error messages.
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| ChannelError::Request(e.without_url()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ChannelError::HttpStatus(status.as_u16()));
            }
            debug!(chat_id, "telegram message delivered");
        }

        Ok(())
    }
}
