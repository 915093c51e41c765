//! Alert data model
//!
//! Everything here is plain data. JSON field names are snake_case and are
//! consumed as-is by the HTTP layer and the dashboard.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{sanitize_retry_delays, sanitize_string_list};

/// History retention used when nothing else is configured.
pub const DEFAULT_HISTORY_RETENTION_DAYS: u32 = 30;

/// Longest accepted history retention, roughly a century.
pub const MAX_HISTORY_RETENTION_DAYS: u32 = 36_500;

/// Retry schedule used when none is configured.
pub const DEFAULT_RETRY_DELAYS_SEC: [u64; 3] = [1, 5, 15];

/// Alert level
///
/// `None` is the rest state. `Test` only exists for manual verification sends
/// and is never produced by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    None,
    Warning,
    Critical,
    Recovery,
    Test,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Warning => "warning",
            Level::Critical => "critical",
            Level::Recovery => "recovery",
            Level::Test => "test",
        }
    }

    /// Upper-case form used in message prefixes and email subjects.
    pub fn as_upper(&self) -> &'static str {
        match self {
            Level::None => "NONE",
            Level::Warning => "WARNING",
            Level::Critical => "CRITICAL",
            Level::Recovery => "RECOVERY",
            Level::Test => "TEST",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown alert level: {0}")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Level::None),
            "warning" => Ok(Level::Warning),
            "critical" => Ok(Level::Critical),
            "recovery" => Ok(Level::Recovery),
            "test" => Ok(Level::Test),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// Threshold and channel configuration
///
/// Must pass [`AlertConfig::validate`] before it becomes the live configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub enabled: bool,
    pub warning_percent: f64,
    pub warning_for_sec: i64,
    pub critical_percent: f64,
    pub critical_for_sec: i64,
    pub recovery_percent: f64,
    pub recovery_for_sec: i64,
    /// Minimum spacing between two notifications of the same level
    pub cooldown_sec: i64,
    pub telegram_enabled: bool,
    pub email_enabled: bool,
    #[serde(default)]
    pub recipient_emails: Vec<String>,
    #[serde(default)]
    pub telegram_chat_ids: Vec<String>,
    /// Inter-attempt delays; its length is the number of attempts per channel
    #[serde(default = "default_retry_delays")]
    pub retry_delays_sec: Vec<u64>,
}

fn default_retry_delays() -> Vec<u64> {
    DEFAULT_RETRY_DELAYS_SEC.to_vec()
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warning_percent: 75.0,
            warning_for_sec: 300,
            critical_percent: 85.0,
            critical_for_sec: 600,
            recovery_percent: 70.0,
            recovery_for_sec: 300,
            cooldown_sec: 1800,
            telegram_enabled: true,
            email_enabled: true,
            recipient_emails: Vec::new(),
            telegram_chat_ids: Vec::new(),
            retry_delays_sec: default_retry_delays(),
        }
    }
}

/// Decrypted channel credentials, held only in memory.
///
/// Deliberately not `Serialize`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    pub telegram_bot_token: String,
    pub gmail_address: String,
    pub gmail_app_password: String,
}

impl Secrets {
    pub(crate) fn trimmed(&self) -> Secrets {
        Secrets {
            telegram_bot_token: self.telegram_bot_token.trim().to_string(),
            gmail_address: self.gmail_address.trim().to_string(),
            gmail_app_password: self.gmail_app_password.trim().to_string(),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("telegram_bot_token", &redacted(&self.telegram_bot_token))
            .field("gmail_address", &self.gmail_address)
            .field("gmail_app_password", &redacted(&self.gmail_app_password))
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "<empty>" } else { "<redacted>" }
}

/// At-rest form of [`Secrets`]: cipher text tokens plus the clear-text sender address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub telegram_token_cipher: String,
    pub gmail_address: String,
    pub gmail_password_cipher: String,
}

/// Read view of the configuration with non-sensitive secret metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigView {
    #[serde(flatten)]
    pub config: AlertConfig,
    pub has_telegram_token: bool,
    pub telegram_token_mask: String,
    pub has_gmail_password: bool,
    pub gmail_password_mask: String,
    pub gmail_address: String,
    pub secrets_writable: bool,
    pub read_only: bool,
}

/// Partial configuration update. Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateConfigInput {
    pub enabled: Option<bool>,
    pub warning_percent: Option<f64>,
    pub warning_for_sec: Option<i64>,
    pub critical_percent: Option<f64>,
    pub critical_for_sec: Option<i64>,
    pub recovery_percent: Option<f64>,
    pub recovery_for_sec: Option<i64>,
    pub cooldown_sec: Option<i64>,

    pub telegram_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
    pub recipient_emails: Option<Vec<String>>,
    pub telegram_chat_ids: Option<Vec<String>>,
    pub retry_delays_sec: Option<Vec<i64>>,

    pub telegram_bot_token: Option<String>,
    pub clear_telegram_bot_token: bool,
    pub gmail_address: Option<String>,
    pub gmail_app_password: Option<String>,
    pub clear_gmail_app_password: bool,
}

impl UpdateConfigInput {
    /// Apply the present fields to a copy of `current`, sanitizing list inputs.
    pub fn apply_to(&self, current: &AlertConfig) -> AlertConfig {
        let mut config = current.clone();

        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(value) = self.warning_percent {
            config.warning_percent = value;
        }
        if let Some(value) = self.warning_for_sec {
            config.warning_for_sec = value;
        }
        if let Some(value) = self.critical_percent {
            config.critical_percent = value;
        }
        if let Some(value) = self.critical_for_sec {
            config.critical_for_sec = value;
        }
        if let Some(value) = self.recovery_percent {
            config.recovery_percent = value;
        }
        if let Some(value) = self.recovery_for_sec {
            config.recovery_for_sec = value;
        }
        if let Some(value) = self.cooldown_sec {
            config.cooldown_sec = value;
        }
        if let Some(enabled) = self.telegram_enabled {
            config.telegram_enabled = enabled;
        }
        if let Some(enabled) = self.email_enabled {
            config.email_enabled = enabled;
        }
        if let Some(emails) = &self.recipient_emails {
            config.recipient_emails = sanitize_string_list(emails);
        }
        if let Some(chat_ids) = &self.telegram_chat_ids {
            config.telegram_chat_ids = sanitize_string_list(chat_ids);
        }
        if let Some(delays) = &self.retry_delays_sec {
            config.retry_delays_sec = sanitize_retry_delays(delays);
        }

        config
    }
}

/// Externally visible alert status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertStatus {
    pub current_state: Level,
    pub last_cpu_percent: f64,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted_until: Option<DateTime<Utc>>,
    pub silenced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_warning_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_critical_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_recovery_at: Option<DateTime<Utc>>,
    pub read_only: bool,
}

/// Evaluator output meaning "notify now".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub level: Level,
    pub cpu_percent: f64,
}

/// Outcome of delivering one message through one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: String,
    pub success: bool,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ChannelResult {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            success: false,
            attempts: 0,
            error_message: None,
        }
    }
}

/// Immutable record of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: i64,
    pub level: Level,
    pub message: String,
    pub cpu_percent: f64,
    pub channels: Vec<ChannelResult>,
    pub created_at: DateTime<Utc>,
}

/// An event that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlertEvent {
    pub level: Level,
    pub message: String,
    pub cpu_percent: f64,
    pub channels: Vec<ChannelResult>,
    pub created_at: DateTime<Utc>,
}

impl NewAlertEvent {
    pub fn with_id(self, id: i64) -> AlertEvent {
        AlertEvent {
            id,
            level: self.level,
            message: self.message,
            cpu_percent: self.cpu_percent,
            channels: self.channels,
            created_at: self.created_at,
        }
    }
}
