//! Multi-channel notification delivery with per-channel retry

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::channels::{EmailChannel, TelegramChannel};
use super::error::ChannelError;
use super::types::{AlertConfig, ChannelResult, DEFAULT_RETRY_DELAYS_SEC, Level, Secrets};

/// Everything a channel needs to deliver one message.
#[derive(Debug, Clone, Copy)]
pub struct Outgoing<'a> {
    pub config: &'a AlertConfig,
    pub secrets: &'a Secrets,
    pub level: Level,
    pub message: &'a str,
}

/// One outbound notification medium.
///
/// `send` performs a single attempt; retrying is the notifier's job.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Name reported in [`ChannelResult::channel`]
    fn name(&self) -> &'static str;

    fn is_enabled(&self, config: &AlertConfig) -> bool;

    async fn send(&self, outgoing: &Outgoing<'_>) -> Result<(), ChannelError>;
}

/// Delivers a message through every enabled channel.
///
/// Channels run one after the other. A failing channel never affects the
/// result of its siblings.
#[derive(Clone)]
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Notifier {
    /// Telegram followed by email.
    pub fn new() -> Result<Self, ChannelError> {
        Ok(Self::with_channels(vec![
            Arc::new(TelegramChannel::new()?),
            Arc::new(EmailChannel::new()),
        ]))
    }

    pub fn with_channels(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Send `message` through every enabled channel, one result per channel.
    ///
    /// When `cancel` fires, the channel in flight reports the cancellation as
    /// its error and no further channels are attempted.
    pub async fn notify(
        &self,
        cancel: &CancellationToken,
        config: &AlertConfig,
        secrets: &Secrets,
        level: Level,
        message: &str,
    ) -> Vec<ChannelResult> {
        let delays: &[u64] = if config.retry_delays_sec.is_empty() {
            &DEFAULT_RETRY_DELAYS_SEC
        } else {
            &config.retry_delays_sec
        };
        let secrets = secrets.trimmed();
        let outgoing = Outgoing {
            config,
            secrets: &secrets,
            level,
            message,
        };

        let mut results = Vec::with_capacity(self.channels.len());
        for channel in self.channels.iter().filter(|c| c.is_enabled(config)) {
            let result = deliver_with_retry(cancel, channel.as_ref(), &outgoing, delays).await;
            results.push(result);

            if cancel.is_cancelled() {
                debug!("notification cancelled, skipping remaining channels");
                break;
            }
        }
        results
    }
}

async fn deliver_with_retry(
    cancel: &CancellationToken,
    channel: &dyn NotificationChannel,
    outgoing: &Outgoing<'_>,
    delays: &[u64],
) -> ChannelResult {
    let mut result = ChannelResult::new(channel.name());
    let attempts = delays.len().max(1);

    for attempt in 0..attempts {
        result.attempts += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChannelError::Cancelled),
            outcome = channel.send(outgoing) => outcome,
        };

        let err = match outcome {
            Ok(()) => {
                result.success = true;
                result.error_message = None;
                return result;
            }
            Err(err) => err,
        };

        warn!(
            channel = channel.name(),
            attempt = attempt + 1,
            attempts,
            error = %err,
            "notification attempt failed"
        );
        let cancelled = matches!(err, ChannelError::Cancelled);
        result.error_message = Some(err.to_string());
        if cancelled || attempt + 1 == attempts {
            break;
        }

        let delay = Duration::from_secs(delays.get(attempt).copied().unwrap_or_default());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                result.error_message = Some(ChannelError::Cancelled.to_string());
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    result
}
