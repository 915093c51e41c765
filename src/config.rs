use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::alerts::types::{DEFAULT_HISTORY_RETENTION_DAYS, MAX_HISTORY_RETENTION_DAYS};

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./hostwatch.db")
}

/// HTTP API settings
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            enable_cors: true,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_true() -> bool {
    true
}

/// Agent configuration file.
///
/// Every field is optional; an empty object `{}` is a valid configuration.
/// Tokens and the encryption key never live here, they come from the
/// environment (see [`crate::util`]).
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    /// CPU sampling cadence in seconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// How often alert history is purged, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: u32,

    #[serde(default)]
    pub api: ApiSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            sample_interval_secs: default_sample_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
            history_retention_days: default_history_retention_days(),
            api: ApiSettings::default(),
        }
    }
}

impl AgentConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs.max(1))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    /// Reject values the agent cannot honour.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.history_retention_days > MAX_HISTORY_RETENTION_DAYS {
            anyhow::bail!(
                "history_retention_days must be at most {MAX_HISTORY_RETENTION_DAYS}, got {}",
                self.history_retention_days
            );
        }
        Ok(())
    }
}

fn default_sample_interval() -> u64 {
    5
}

fn default_cleanup_interval() -> u64 {
    60 * 60
}

fn default_history_retention_days() -> u32 {
    DEFAULT_HISTORY_RETENTION_DAYS
}

pub fn read_config_file(path: &str) -> anyhow::Result<AgentConfig> {
    let file_content = std::fs::read_to_string(path)?;
    let config: AgentConfig = serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
