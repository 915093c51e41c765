//! Alert store trait definition
//!
//! This module defines the `AlertStore` trait that every persistence backend
//! implements.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use crate::alerts::types::{AlertConfig, AlertEvent, NewAlertEvent, SecretRecord};

/// Page size used when the caller asks for zero or fewer events
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Largest page a single history query may return
pub const MAX_HISTORY_LIMIT: u32 = 500;

/// Page request for the event history, newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Page size, already clamped to `1..=MAX_HISTORY_LIMIT`
    pub limit: u32,

    /// Only return events with an id strictly lower than this one
    pub before_id: Option<i64>,
}

impl HistoryQuery {
    /// Build a query from raw caller input.
    ///
    /// `limit <= 0` becomes [`DEFAULT_HISTORY_LIMIT`], anything above
    /// [`MAX_HISTORY_LIMIT`] is capped. A non-positive cursor is ignored.
    pub fn new(limit: i64, before_id: Option<i64>) -> Self {
        let limit = if limit <= 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            limit.min(MAX_HISTORY_LIMIT as i64) as u32
        };
        Self {
            limit,
            before_id: before_id.filter(|id| *id > 0),
        }
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::new(0, None)
    }
}

/// Health status of the store
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Persistence used by the alert service
///
/// Holds one settings record, one secret record, one silence record and an
/// append-only event log. Implementations must be `Send + Sync`; the service
/// calls them from the evaluation loop and from request handlers at the same
/// time.
///
/// Methods return `StorageResult<T>`; backend errors are converted into
/// `StorageError` variants.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Load the persisted configuration, or the defaults if none was saved
    async fn load_config(&self) -> StorageResult<AlertConfig>;

    async fn save_config(&self, config: &AlertConfig) -> StorageResult<()>;

    async fn load_secret_record(&self) -> StorageResult<SecretRecord>;

    async fn save_secret_record(&self, record: &SecretRecord) -> StorageResult<()>;

    /// Append one event and return its id
    ///
    /// Ids are strictly increasing in insertion order.
    async fn append_event(&self, event: NewAlertEvent) -> StorageResult<i64>;

    /// List events ordered by id, newest first
    async fn list_events(&self, query: HistoryQuery) -> StorageResult<Vec<AlertEvent>>;

    /// Delete events created strictly before `before`
    ///
    /// Returns the number of events deleted.
    async fn cleanup_events_before(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    async fn muted_until(&self) -> StorageResult<Option<DateTime<Utc>>>;

    /// Persist the silence deadline, `None` clears it
    async fn set_muted_until(&self, until: Option<DateTime<Utc>>) -> StorageResult<()>;

    /// Lightweight check that the backend is operational
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
