//! In-memory alert store (no persistence)
//!
//! Used when storage is disabled in the agent configuration, and by tests.
//! Everything is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{AlertStore, HealthStatus, HistoryQuery};
use super::error::StorageResult;
use crate::alerts::types::{AlertConfig, AlertEvent, NewAlertEvent, SecretRecord};

#[derive(Debug, Default)]
struct Inner {
    config: AlertConfig,
    secrets: SecretRecord,
    muted_until: Option<DateTime<Utc>>,
    /// Ascending by id
    events: Vec<AlertEvent>,
    next_id: i64,
}

/// In-memory alert store
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a configuration.
    pub fn with_config(config: AlertConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                config,
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn load_config(&self) -> StorageResult<AlertConfig> {
        Ok(self.inner.read().await.config.clone())
    }

    async fn save_config(&self, config: &AlertConfig) -> StorageResult<()> {
        self.inner.write().await.config = config.clone();
        Ok(())
    }

    async fn load_secret_record(&self) -> StorageResult<SecretRecord> {
        Ok(self.inner.read().await.secrets.clone())
    }

    async fn save_secret_record(&self, record: &SecretRecord) -> StorageResult<()> {
        self.inner.write().await.secrets = record.clone();
        Ok(())
    }

    async fn append_event(&self, event: NewAlertEvent) -> StorageResult<i64> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.events.push(event.with_id(id));
        Ok(id)
    }

    async fn list_events(&self, query: HistoryQuery) -> StorageResult<Vec<AlertEvent>> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .iter()
            .rev()
            .filter(|e| query.before_id.is_none_or(|before| e.id < before))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn cleanup_events_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut inner = self.inner.write().await;
        let len = inner.events.len();
        inner.events.retain(|e| e.created_at >= before);
        let deleted = len - inner.events.len();
        debug!("removed {} events from memory store", deleted);
        Ok(deleted)
    }

    async fn muted_until(&self) -> StorageResult<Option<DateTime<Utc>>> {
        Ok(self.inner.read().await.muted_until)
    }

    async fn set_muted_until(&self, until: Option<DateTime<Utc>>) -> StorageResult<()> {
        self.inner.write().await.muted_until = until;
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let mut metadata = HashMap::new();
        metadata.insert("backend".to_string(), "memory".to_string());
        metadata.insert(
            "events".to_string(),
            self.inner.read().await.events.len().to_string(),
        );

        Ok(HealthStatus {
            healthy: true,
            message: "in-memory alert store operational".to_string(),
            metadata,
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
