//! SQLite alert store
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers are not blocked by the evaluation loop appending events
//! - **Migrations**: Schema and singleton rows are created by sqlx migrations
//!
//! List columns (recipients, chat ids, retry delays, channel results) are stored
//! as JSON text. A column that fails to decode is read back as empty rather
//! than failing the whole load.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{AlertStore, HealthStatus, HistoryQuery};
use super::error::{StorageError, StorageResult};
use crate::alerts::types::{
    AlertConfig, AlertEvent, ChannelResult, DEFAULT_RETRY_DELAYS_SEC, Level, NewAlertEvent,
    SecretRecord,
};

/// SQLite alert store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Open (or create) the database file and run migrations.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("opening alert store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("alert store ready");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn event_from_row(row: &SqliteRow) -> StorageResult<AlertEvent> {
        let id: i64 = row.try_get("id")?;
        let level: String = row.try_get("level")?;
        let channels_json: String = row.try_get("channels_json")?;

        let level = level.parse::<Level>().unwrap_or_else(|e| {
            warn!(event_id = id, "{e}, reading as none");
            Level::None
        });

        Ok(AlertEvent {
            id,
            level,
            message: row.try_get("message")?,
            cpu_percent: row.try_get("cpu_percent")?,
            channels: decode_json_column::<Vec<ChannelResult>>("channels_json", &channels_json),
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?),
        })
    }
}

fn decode_json_column<T: DeserializeOwned + Default>(column: &str, raw: &str) -> T {
    if raw.trim().is_empty() {
        return T::default();
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(column, "failed to decode stored JSON: {}", e);
        T::default()
    })
}

#[async_trait]
impl AlertStore for SqliteStore {
    #[instrument(skip(self))]
    async fn load_config(&self) -> StorageResult<AlertConfig> {
        let row = sqlx::query(
            r#"
            SELECT enabled, warning_percent, warning_for_sec,
                   critical_percent, critical_for_sec,
                   recovery_percent, recovery_for_sec,
                   cooldown_sec, telegram_enabled, email_enabled,
                   recipient_emails, telegram_chat_ids, retry_delays_sec
            FROM alert_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(AlertConfig::default());
        };

        let recipients: String = row.try_get("recipient_emails")?;
        let chat_ids: String = row.try_get("telegram_chat_ids")?;
        let retry: String = row.try_get("retry_delays_sec")?;

        let mut retry_delays_sec = decode_json_column::<Vec<u64>>("retry_delays_sec", &retry);
        if retry_delays_sec.is_empty() {
            retry_delays_sec = DEFAULT_RETRY_DELAYS_SEC.to_vec();
        }

        Ok(AlertConfig {
            enabled: row.try_get("enabled")?,
            warning_percent: row.try_get("warning_percent")?,
            warning_for_sec: row.try_get("warning_for_sec")?,
            critical_percent: row.try_get("critical_percent")?,
            critical_for_sec: row.try_get("critical_for_sec")?,
            recovery_percent: row.try_get("recovery_percent")?,
            recovery_for_sec: row.try_get("recovery_for_sec")?,
            cooldown_sec: row.try_get("cooldown_sec")?,
            telegram_enabled: row.try_get("telegram_enabled")?,
            email_enabled: row.try_get("email_enabled")?,
            recipient_emails: decode_json_column("recipient_emails", &recipients),
            telegram_chat_ids: decode_json_column("telegram_chat_ids", &chat_ids),
            retry_delays_sec,
        })
    }

    #[instrument(skip_all)]
    async fn save_config(&self, config: &AlertConfig) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE alert_settings
            SET enabled = ?, warning_percent = ?, warning_for_sec = ?,
                critical_percent = ?, critical_for_sec = ?,
                recovery_percent = ?, recovery_for_sec = ?,
                cooldown_sec = ?, telegram_enabled = ?, email_enabled = ?,
                recipient_emails = ?, telegram_chat_ids = ?, retry_delays_sec = ?,
                updated_at = ?
            WHERE id = 1
            "#,
        )
        .bind(config.enabled)
        .bind(config.warning_percent)
        .bind(config.warning_for_sec)
        .bind(config.critical_percent)
        .bind(config.critical_for_sec)
        .bind(config.recovery_percent)
        .bind(config.recovery_for_sec)
        .bind(config.cooldown_sec)
        .bind(config.telegram_enabled)
        .bind(config.email_enabled)
        .bind(serde_json::to_string(&config.recipient_emails)?)
        .bind(serde_json::to_string(&config.telegram_chat_ids)?)
        .bind(serde_json::to_string(&config.retry_delays_sec)?)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!("alert config saved");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_secret_record(&self) -> StorageResult<SecretRecord> {
        let row = sqlx::query(
            r#"
            SELECT telegram_token_cipher, gmail_address, gmail_password_cipher
            FROM alert_secrets
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(SecretRecord {
                telegram_token_cipher: row.try_get("telegram_token_cipher")?,
                gmail_address: row.try_get("gmail_address")?,
                gmail_password_cipher: row.try_get("gmail_password_cipher")?,
            }),
            None => Ok(SecretRecord::default()),
        }
    }

    #[instrument(skip_all)]
    async fn save_secret_record(&self, record: &SecretRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE alert_secrets
            SET telegram_token_cipher = ?, gmail_address = ?, gmail_password_cipher = ?,
                updated_at = ?
            WHERE id = 1
            "#,
        )
        .bind(&record.telegram_token_cipher)
        .bind(&record.gmail_address)
        .bind(&record.gmail_password_cipher)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip_all, fields(level = %event.level))]
    async fn append_event(&self, event: NewAlertEvent) -> StorageResult<i64> {
        let channels_json = serde_json::to_string(&event.channels)?;

        let result = sqlx::query(
            r#"
            INSERT INTO alert_events (level, message, cpu_percent, channels_json, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.level.as_str())
        .bind(&event.message)
        .bind(event.cpu_percent)
        .bind(channels_json)
        .bind(event.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    #[instrument(skip(self))]
    async fn list_events(&self, query: HistoryQuery) -> StorageResult<Vec<AlertEvent>> {
        let rows = match query.before_id {
            Some(before_id) => {
                sqlx::query(
                    r#"
                    SELECT id, level, message, cpu_percent, channels_json, created_at
                    FROM alert_events
                    WHERE id < ?
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(before_id)
                .bind(query.limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, level, message, cpu_percent, channels_json, created_at
                    FROM alert_events
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(query.limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::event_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn cleanup_events_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let result = sqlx::query("DELETE FROM alert_events WHERE created_at < ?")
            .bind(before.timestamp_millis())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        if deleted > 0 {
            info!("deleted {} alert events older than {}", deleted, before);
        }
        Ok(deleted)
    }

    async fn muted_until(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let millis: Option<Option<i64>> =
            sqlx::query_scalar("SELECT muted_until FROM alert_silence WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(millis.flatten().map(Self::millis_to_timestamp))
    }

    #[instrument(skip(self))]
    async fn set_muted_until(&self, until: Option<DateTime<Utc>>) -> StorageResult<()> {
        sqlx::query("UPDATE alert_silence SET muted_until = ?, updated_at = ? WHERE id = 1")
            .bind(until.map(|t| t.timestamp_millis()))
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite alert store operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite alert store");
        self.pool.close().await;
        Ok(())
    }
}
