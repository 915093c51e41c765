//! Alert service: live configuration, secrets, silencing and history housekeeping
//!
//! The service is the only owner of the evaluator. `run` drives it from the
//! snapshot stream; every other entry point may be called concurrently from
//! request handlers.
//!
//! ## Locking
//!
//! - `state` guards config, secrets, the secret record, status and the
//!   evaluator. It is only held for in-memory access, never across a network
//!   or store call.
//! - `update_lock` serializes mutations that persist before they swap state
//!   (config updates, silence changes).
//! - `last_cleanup_run` is held for the duration of a cleanup pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use super::cipher::Cipher;
use super::error::{AlertError, AlertResult, CipherError};
use super::evaluator::Evaluator;
use super::notifier::Notifier;
use super::types::{
    AlertConfig, AlertEvent, AlertStatus, ConfigView, DEFAULT_HISTORY_RETENTION_DAYS, Level,
    MAX_HISTORY_RETENTION_DAYS, NewAlertEvent, SecretRecord, Secrets, Trigger, UpdateConfigInput,
};
use super::validation::{is_silenced_at, mask_secret};
use crate::Snapshot;
use crate::storage::{AlertStore, HealthStatus, HistoryQuery};

/// Silence durations accepted by [`AlertService::set_silence`], in minutes
pub const MAX_SILENCE_MINUTES: i64 = 1440;

const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Construction options for [`AlertService`]
#[derive(Debug, Clone)]
pub struct AlertServiceOptions {
    /// Host name rendered into every message
    pub hostname: String,
    /// Events older than this are purged; 0 means the default of 30 days
    pub history_retention_days: u32,
    pub cleanup_interval: Duration,
    /// Scopes the whole service lifetime, including in-flight notifications
    pub cancel: CancellationToken,
}

impl Default for AlertServiceOptions {
    fn default() -> Self {
        Self {
            hostname: "unknown-host".to_string(),
            history_retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }
}

struct ServiceState {
    config: AlertConfig,
    secrets: Secrets,
    record: SecretRecord,
    status: AlertStatus,
    evaluator: Evaluator,
}

/// Notification that still has to be delivered and recorded.
struct PendingDispatch {
    trigger: Trigger,
    config: AlertConfig,
    secrets: Secrets,
    at: DateTime<Utc>,
}

pub struct AlertService {
    store: Arc<dyn AlertStore>,
    notifier: Notifier,
    cipher: Cipher,
    /// Why secrets are read-only, `None` when they are writable
    key_error: Option<CipherError>,
    hostname: String,
    history_retention_days: u32,
    cleanup_interval: Duration,
    cancel: CancellationToken,

    state: RwLock<ServiceState>,
    update_lock: Mutex<()>,
    last_cleanup_run: Mutex<Option<Instant>>,
    dispatches: TaskTracker,
}

impl AlertService {
    /// Load persisted state and build the service.
    ///
    /// Without a usable `encryption_key` the service starts with read-only
    /// secrets: stored credentials stay unset in memory and every secret write
    /// fails, but evaluation and notification keep working. A stored secret
    /// that does not decrypt is left blank.
    #[instrument(skip_all, fields(hostname = %options.hostname))]
    pub async fn new(
        store: Arc<dyn AlertStore>,
        notifier: Notifier,
        encryption_key: Option<&str>,
        options: AlertServiceOptions,
    ) -> AlertResult<Self> {
        let config = store.load_config().await?;
        let record = store.load_secret_record().await?;
        let muted_until = store.muted_until().await?;

        let (cipher, key_error) =
            match Cipher::from_base64_key(encryption_key.unwrap_or_default()) {
                Ok(cipher) => (cipher, None),
                Err(CipherError::MissingKey) => {
                    info!("no alert encryption key configured, secrets are read-only");
                    (Cipher::disabled(), Some(CipherError::MissingKey))
                }
                Err(e) => {
                    warn!("unusable alert encryption key, secrets are read-only: {}", e);
                    (Cipher::disabled(), Some(e))
                }
            };

        let secrets = Secrets {
            telegram_bot_token: decrypt_or_blank(
                &cipher,
                &record.telegram_token_cipher,
                "telegram token",
            ),
            gmail_address: record.gmail_address.trim().to_string(),
            gmail_app_password: decrypt_or_blank(
                &cipher,
                &record.gmail_password_cipher,
                "gmail app password",
            ),
        };

        let status = AlertStatus {
            muted_until,
            silenced: is_silenced_at(muted_until, Utc::now()),
            ..Default::default()
        };

        let history_retention_days = match options.history_retention_days {
            0 => DEFAULT_HISTORY_RETENTION_DAYS,
            days if days > MAX_HISTORY_RETENTION_DAYS => {
                warn!(
                    requested = days,
                    max = MAX_HISTORY_RETENTION_DAYS,
                    "history retention too long, clamping"
                );
                MAX_HISTORY_RETENTION_DAYS
            }
            days => days,
        };

        Ok(Self {
            store,
            notifier,
            cipher,
            key_error,
            hostname: options.hostname,
            history_retention_days,
            cleanup_interval: options.cleanup_interval,
            cancel: options.cancel,
            state: RwLock::new(ServiceState {
                config,
                secrets,
                record,
                status,
                evaluator: Evaluator::new(),
            }),
            update_lock: Mutex::new(()),
            last_cleanup_run: Mutex::new(None),
            dispatches: TaskTracker::new(),
        })
    }

    /// Consume snapshots until cancelled or the channel closes.
    ///
    /// Dispatches run on their own tasks so slow channels and retry sleeps
    /// never hold up the next snapshot. They are awaited before returning.
    pub async fn run(self: Arc<Self>, mut snapshots: broadcast::Receiver<Snapshot>) {
        info!(hostname = %self.hostname, "alert service started");

        let mut cleanup = tokio::time::interval_at(
            Instant::now() + self.cleanup_interval,
            self.cleanup_interval,
        );
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("alert service cancelled");
                    break;
                }
                _ = cleanup.tick() => {
                    self.cleanup_old_events().await;
                }
                received = snapshots.recv() => match received {
                    Ok(snapshot) => {
                        for pending in self.evaluate(&snapshot).await {
                            let service = Arc::clone(&self);
                            self.dispatches.spawn(async move {
                                service.dispatch(pending).await;
                            });
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("alert service lagged behind, skipped {} snapshots", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("snapshot channel closed");
                        break;
                    }
                },
            }
        }

        self.dispatches.close();
        self.dispatches.wait().await;
        info!("alert service stopped");
    }

    /// Evaluate one snapshot and deliver its triggers before returning.
    pub async fn evaluate_snapshot(&self, snapshot: &Snapshot) -> Vec<Trigger> {
        let pending = self.evaluate(snapshot).await;
        let triggers = pending.iter().map(|p| p.trigger).collect();
        for dispatch in pending {
            self.dispatch(dispatch).await;
        }
        triggers
    }

    async fn evaluate(&self, snapshot: &Snapshot) -> Vec<PendingDispatch> {
        let now = snapshot.timestamp;
        let cpu_percent = snapshot.cpu_total_percent;

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        state.status.last_evaluated_at = Some(now);
        state.status.last_cpu_percent = cpu_percent;
        state.status.silenced = is_silenced_at(state.status.muted_until, now);

        let triggers =
            state
                .evaluator
                .evaluate(now, cpu_percent, &state.config, state.status.silenced);

        state.status.current_state = state.evaluator.state();
        state.status.last_warning_at = state.evaluator.last_warning_at();
        state.status.last_critical_at = state.evaluator.last_critical_at();
        state.status.last_recovery_at = state.evaluator.last_recovery_at();

        triggers
            .into_iter()
            .map(|trigger| PendingDispatch {
                trigger,
                config: state.config.clone(),
                secrets: state.secrets.clone(),
                at: now,
            })
            .collect()
    }

    #[instrument(skip_all, fields(level = %pending.trigger.level))]
    async fn dispatch(&self, pending: PendingDispatch) {
        let PendingDispatch {
            trigger,
            config,
            secrets,
            at,
        } = pending;

        let message = format_alert_message(trigger.level, &self.hostname, trigger.cpu_percent, at);
        info!("{}", message);

        let channels = self
            .notifier
            .notify(&self.cancel, &config, &secrets, trigger.level, &message)
            .await;

        let event = NewAlertEvent {
            level: trigger.level,
            message,
            cpu_percent: trigger.cpu_percent,
            channels,
            created_at: at,
        };
        if let Err(e) = self.store.append_event(event).await {
            error!("failed to record alert event: {}", e);
        }
    }

    /// Send a test message through the enabled channels and record it.
    #[instrument(skip(self))]
    pub async fn trigger_test(&self) -> AlertResult<AlertEvent> {
        let (config, secrets) = {
            let state = self.state.read().await;
            (state.config.clone(), state.secrets.clone())
        };

        if !config.telegram_enabled && !config.email_enabled {
            return Err(AlertError::ChannelsDisabled);
        }

        let now = Utc::now();
        let message = format_test_message(&self.hostname, now);
        let channels = self
            .notifier
            .notify(&self.cancel, &config, &secrets, Level::Test, &message)
            .await;

        let event = NewAlertEvent {
            level: Level::Test,
            message,
            cpu_percent: 0.0,
            channels,
            created_at: now,
        };
        let id = self.store.append_event(event.clone()).await?;
        Ok(event.with_id(id))
    }

    pub async fn config_view(&self, read_only: bool) -> ConfigView {
        let state = self.state.read().await;
        self.build_view(&state.config, &state.secrets, &state.record, read_only)
    }

    fn build_view(
        &self,
        config: &AlertConfig,
        secrets: &Secrets,
        record: &SecretRecord,
        read_only: bool,
    ) -> ConfigView {
        let has_telegram_token = !record.telegram_token_cipher.trim().is_empty();
        let has_gmail_password = !record.gmail_password_cipher.trim().is_empty();

        ConfigView {
            config: config.clone(),
            has_telegram_token,
            telegram_token_mask: mask_secret(&secrets.telegram_bot_token, has_telegram_token),
            has_gmail_password,
            gmail_password_mask: mask_secret(&secrets.gmail_app_password, has_gmail_password),
            gmail_address: record.gmail_address.trim().to_string(),
            secrets_writable: self.secrets_writable(),
            read_only,
        }
    }

    /// Apply a partial update.
    ///
    /// The update is all or nothing: on any error the live configuration,
    /// secrets and secret record are left as they were.
    #[instrument(skip_all)]
    pub async fn update_config(&self, input: UpdateConfigInput) -> AlertResult<ConfigView> {
        let _update = self.update_lock.lock().await;

        let (current_config, mut secrets, mut record) = {
            let state = self.state.read().await;
            (
                state.config.clone(),
                state.secrets.clone(),
                state.record.clone(),
            )
        };

        let config = input.apply_to(&current_config);
        config.validate()?;

        if let Some(token) = non_blank(input.telegram_bot_token.as_deref()) {
            record.telegram_token_cipher = self.encrypt_secret(token)?;
            secrets.telegram_bot_token = token.to_string();
        }
        if input.clear_telegram_bot_token {
            record.telegram_token_cipher.clear();
            secrets.telegram_bot_token.clear();
        }

        if let Some(address) = non_blank(input.gmail_address.as_deref()) {
            record.gmail_address = address.to_string();
            secrets.gmail_address = address.to_string();
        }

        if let Some(password) = non_blank(input.gmail_app_password.as_deref()) {
            record.gmail_password_cipher = self.encrypt_secret(password)?;
            secrets.gmail_app_password = password.to_string();
        }
        if input.clear_gmail_app_password {
            record.gmail_password_cipher.clear();
            secrets.gmail_app_password.clear();
        }

        self.store.save_config(&config).await?;
        if let Err(e) = self.store.save_secret_record(&record).await {
            if let Err(rollback) = self.store.save_config(&current_config).await {
                error!("failed to restore alert config after secret write error: {}", rollback);
            }
            return Err(e.into());
        }

        let view = self.build_view(&config, &secrets, &record, false);
        {
            let mut state = self.state.write().await;
            state.config = config;
            state.secrets = secrets;
            state.record = record;
        }

        info!("alert configuration updated");
        Ok(view)
    }

    fn encrypt_secret(&self, plaintext: &str) -> AlertResult<String> {
        if let Some(reason) = &self.key_error {
            return Err(AlertError::SecretsUnavailable(reason.clone()));
        }
        Ok(self.cipher.encrypt(plaintext)?)
    }

    pub async fn status(&self, read_only: bool) -> AlertStatus {
        let state = self.state.read().await;
        let mut status = state.status.clone();
        status.silenced = is_silenced_at(status.muted_until, Utc::now());
        status.read_only = read_only;
        status
    }

    /// Silence notifications for `minutes` (1 to 1440) from now.
    pub async fn set_silence(&self, minutes: i64) -> AlertResult<DateTime<Utc>> {
        if !(1..=MAX_SILENCE_MINUTES).contains(&minutes) {
            return Err(AlertError::InvalidSilence(minutes));
        }

        let _update = self.update_lock.lock().await;
        let until = Utc::now() + TimeDelta::minutes(minutes);
        self.store.set_muted_until(Some(until)).await?;

        let mut state = self.state.write().await;
        state.status.muted_until = Some(until);
        state.status.silenced = true;
        info!(%until, "alerts silenced");
        Ok(until)
    }

    pub async fn clear_silence(&self) -> AlertResult<()> {
        let _update = self.update_lock.lock().await;
        self.store.set_muted_until(None).await?;

        let mut state = self.state.write().await;
        state.status.muted_until = None;
        state.status.silenced = false;
        info!("alert silence cleared");
        Ok(())
    }

    /// Newest-first page of events; see [`HistoryQuery::new`] for clamping.
    pub async fn list_history(
        &self,
        limit: i64,
        before_id: Option<i64>,
    ) -> AlertResult<Vec<AlertEvent>> {
        Ok(self
            .store
            .list_events(HistoryQuery::new(limit, before_id))
            .await?)
    }

    /// Purge events past the retention window.
    ///
    /// Returns `None` when skipped because the previous pass is more recent
    /// than the cleanup interval, or when the store failed.
    pub async fn cleanup_old_events(&self) -> Option<usize> {
        let mut last_run = self.last_cleanup_run.lock().await;
        if last_run.is_some_and(|at| at.elapsed() < self.cleanup_interval) {
            debug!("skipping alert history cleanup, last run too recent");
            return None;
        }
        *last_run = Some(Instant::now());

        let Some(cutoff) = TimeDelta::try_days(i64::from(self.history_retention_days))
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            debug!(
                retention_days = self.history_retention_days,
                "retention reaches past the earliest representable time, nothing to purge"
            );
            return Some(0);
        };
        match self.store.cleanup_events_before(cutoff).await {
            Ok(deleted) => {
                debug!(deleted, %cutoff, "alert history cleanup finished");
                Some(deleted)
            }
            Err(e) => {
                warn!("alert history cleanup failed: {}", e);
                None
            }
        }
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.read().await.config.enabled
    }

    pub fn secrets_writable(&self) -> bool {
        self.key_error.is_none()
    }

    pub fn history_retention_days(&self) -> u32 {
        self.history_retention_days
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn store_health(&self) -> AlertResult<HealthStatus> {
        Ok(self.store.health_check().await?)
    }
}

fn decrypt_or_blank(cipher: &Cipher, token: &str, field: &'static str) -> String {
    if token.trim().is_empty() {
        return String::new();
    }
    match cipher.decrypt(token) {
        Ok(plain) => plain,
        Err(CipherError::MissingKey) => String::new(),
        Err(e) => {
            warn!(field, "stored secret could not be decrypted: {}", e);
            String::new()
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn format_alert_message(
    level: Level,
    hostname: &str,
    cpu_percent: f64,
    at: DateTime<Utc>,
) -> String {
    format!(
        "[hostwatch][{}] Host={} CPU={:.2}% Time={}",
        level.as_upper(),
        hostname,
        cpu_percent,
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

fn format_test_message(hostname: &str, at: DateTime<Utc>) -> String {
    format!(
        "[hostwatch][TEST] Host={} Time={}",
        hostname,
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
