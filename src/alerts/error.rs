//! Error types for the alerting engine

use crate::storage::StorageError;

/// Result type alias for alert service operations
pub type AlertResult<T> = Result<T, AlertError>;

/// Failures of the secret cipher.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CipherError {
    /// No encryption key configured; secrets are read-only.
    #[error("missing alert encryption key")]
    MissingKey,

    /// The key is not valid base64 or does not decode to 32 bytes.
    #[error("invalid alert encryption key: {0}")]
    InvalidKey(String),

    #[error("failed to initialise AES-256-GCM from key")]
    CipherInitFailed,

    #[error("failed to decode cipher text: {0}")]
    DecodeFailed(#[from] base64::DecodeError),

    #[error("cipher text too short: {len} bytes, nonce alone needs {nonce_len}")]
    Truncated { len: usize, nonce_len: usize },

    /// Tampered cipher text or wrong key.
    #[error("cipher text failed authentication")]
    AuthenticationFailed,

    #[error("random source failed: {0}")]
    RandomSource(String),

    #[error("decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}

/// Failure of a single delivery attempt on one notification channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("{0} is empty")]
    MissingCredential(&'static str),

    #[error("{0} is empty")]
    NoRecipients(&'static str),

    #[error("send failed with status {0}")]
    HttpStatus(u16),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build failed: {0}")]
    Build(String),

    #[error("smtp send failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("notification cancelled")]
    Cancelled,
}

/// Errors surfaced by [`AlertService`](super::AlertService) operations.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// A configuration update failed validation; nothing was changed.
    #[error("invalid alert configuration: {0}")]
    Configuration(String),

    /// A secret write was requested but no usable encryption key is configured.
    #[error("secrets unavailable: {0}")]
    SecretsUnavailable(#[source] CipherError),

    #[error("secret encryption failed: {0}")]
    Crypto(#[from] CipherError),

    #[error("alert persistence failed: {0}")]
    Persistence(#[from] StorageError),

    #[error("both notification channels are disabled")]
    ChannelsDisabled,

    #[error("silence duration must be between 1 and 1440 minutes, got {0}")]
    InvalidSilence(i64),
}

impl AlertError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        AlertError::Configuration(message.into())
    }
}
