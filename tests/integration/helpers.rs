//! Helper types and builders for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use hostwatch::Snapshot;
use hostwatch::alerts::{
    AlertConfig, AlertEvent, AlertService, AlertServiceOptions, ChannelError, NewAlertEvent,
    NotificationChannel, Notifier, Outgoing, SecretRecord,
};
use hostwatch::storage::{
    AlertStore, HealthStatus, HistoryQuery, MemoryStore, StorageError, StorageResult,
};
use tokio::sync::Mutex;

pub const HOSTNAME: &str = "test-host";

pub fn test_key() -> String {
    STANDARD.encode([7u8; 32])
}

/// Short windows, one attempt per channel, no retry sleeps.
pub fn fast_config() -> AlertConfig {
    AlertConfig {
        enabled: true,
        warning_percent: 75.0,
        warning_for_sec: 60,
        critical_percent: 90.0,
        critical_for_sec: 120,
        recovery_percent: 60.0,
        recovery_for_sec: 60,
        cooldown_sec: 600,
        telegram_enabled: true,
        email_enabled: false,
        recipient_emails: Vec::new(),
        telegram_chat_ids: vec!["1001".to_string()],
        retry_delays_sec: vec![0],
    }
}

pub fn snapshot_at(base: DateTime<Utc>, offset_sec: i64, cpu: f64) -> Snapshot {
    Snapshot::new(base + TimeDelta::seconds(offset_sec), cpu)
}

/// One delivery as seen by a [`ScriptedChannel`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: &'static str,
    pub level: String,
    pub message: String,
}

/// Channel that replays a script of outcomes, then succeeds.
pub struct ScriptedChannel {
    name: &'static str,
    script: Mutex<VecDeque<bool>>,
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl ScriptedChannel {
    pub fn succeeding(name: &'static str) -> Self {
        Self::with_script(name, Vec::new())
    }

    pub fn failing(name: &'static str, failures: usize) -> Self {
        Self::with_script(name, vec![false; failures])
    }

    pub fn with_script(name: &'static str, script: Vec<bool>) -> Self {
        Self {
            name,
            script: Mutex::new(script.into()),
            deliveries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn deliveries(&self) -> Arc<Mutex<Vec<Delivery>>> {
        Arc::clone(&self.deliveries)
    }
}

#[async_trait]
impl NotificationChannel for ScriptedChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_enabled(&self, config: &AlertConfig) -> bool {
        config.telegram_enabled || config.email_enabled
    }

    async fn send(&self, outgoing: &Outgoing<'_>) -> Result<(), ChannelError> {
        let succeed = self.script.lock().await.pop_front().unwrap_or(true);
        if !succeed {
            return Err(ChannelError::HttpStatus(503));
        }
        self.deliveries.lock().await.push(Delivery {
            channel: self.name,
            level: outgoing.level.to_string(),
            message: outgoing.message.to_string(),
        });
        Ok(())
    }
}

/// Memory store whose writes can be made to fail on demand.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    pub fail_config_saves: AtomicBool,
    pub fail_secret_saves: AtomicBool,
    pub fail_appends: AtomicBool,
    pub fail_cleanup: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AlertConfig) -> Self {
        Self {
            inner: MemoryStore::with_config(config),
            ..Default::default()
        }
    }

    fn check(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed(format!("{what} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertStore for FailingStore {
    async fn load_config(&self) -> StorageResult<AlertConfig> {
        self.inner.load_config().await
    }

    async fn save_config(&self, config: &AlertConfig) -> StorageResult<()> {
        Self::check(&self.fail_config_saves, "save config")?;
        self.inner.save_config(config).await
    }

    async fn load_secret_record(&self) -> StorageResult<SecretRecord> {
        self.inner.load_secret_record().await
    }

    async fn save_secret_record(&self, record: &SecretRecord) -> StorageResult<()> {
        Self::check(&self.fail_secret_saves, "save secrets")?;
        self.inner.save_secret_record(record).await
    }

    async fn append_event(&self, event: NewAlertEvent) -> StorageResult<i64> {
        Self::check(&self.fail_appends, "append event")?;
        self.inner.append_event(event).await
    }

    async fn list_events(&self, query: HistoryQuery) -> StorageResult<Vec<AlertEvent>> {
        self.inner.list_events(query).await
    }

    async fn cleanup_events_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        Self::check(&self.fail_cleanup, "cleanup")?;
        self.inner.cleanup_events_before(before).await
    }

    async fn muted_until(&self) -> StorageResult<Option<DateTime<Utc>>> {
        self.inner.muted_until().await
    }

    async fn set_muted_until(&self, until: Option<DateTime<Utc>>) -> StorageResult<()> {
        self.inner.set_muted_until(until).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

pub fn options() -> AlertServiceOptions {
    AlertServiceOptions {
        hostname: HOSTNAME.to_string(),
        ..Default::default()
    }
}

pub async fn build_service(
    store: Arc<dyn AlertStore>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    key: Option<&str>,
) -> AlertService {
    AlertService::new(store, Notifier::with_channels(channels), key, options())
        .await
        .unwrap()
}

/// Service over a memory store seeded with [`fast_config`] and one channel.
pub async fn service_with_channel(
    channel: Arc<ScriptedChannel>,
) -> (AlertService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_config(fast_config()));
    let service = build_service(
        store.clone(),
        vec![channel as Arc<dyn NotificationChannel>],
        Some(&test_key()),
    )
    .await;
    (service, store)
}
