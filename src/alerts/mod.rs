//! CPU alerting engine
//!
//! This module turns a stream of CPU snapshots into notifications.
//!
//! ## Data Flow
//!
//! ```text
//! Snapshot ──► AlertService::evaluate_snapshot
//!                  │ (state lock held)
//!                  ▼
//!              Evaluator::evaluate ──► 0..n Trigger
//!                  │ (state lock released)
//!                  ▼
//!              AlertService::dispatch ──► Notifier::notify ──► ChannelResult per channel
//!                  │
//!                  ▼
//!              AlertStore::append_event
//! ```
//!
//! ## Components
//!
//! - **Cipher**: AES-256-GCM encryption of channel credentials at rest
//! - **Evaluator**: hysteresis state machine with dwell windows and cooldowns
//! - **Notifier**: delivers a message through every enabled channel, each with its own retries
//! - **AlertService**: owns live configuration and secrets, silencing and history housekeeping

pub mod channels;
pub mod cipher;
pub mod error;
pub mod evaluator;
pub mod notifier;
pub mod service;
pub mod types;
pub mod validation;

pub use cipher::Cipher;
pub use error::{AlertError, AlertResult, ChannelError, CipherError};
pub use evaluator::Evaluator;
pub use notifier::{NotificationChannel, Notifier, Outgoing};
pub use service::{AlertService, AlertServiceOptions};
pub use types::{
    AlertConfig, AlertEvent, AlertStatus, ChannelResult, ConfigView, Level, NewAlertEvent,
    SecretRecord, Secrets, Trigger, UpdateConfigInput,
};
