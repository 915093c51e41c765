//! Persistence for alert configuration, secrets, silence and history
//!
//! `AlertStore` is the only thing the alert service knows about storage.
//!
//! ## Backends
//!
//! - **SQLite** (default): embedded database file, schema managed by sqlx migrations
//! - **In-Memory**: no persistence, used when storage is disabled and in tests
//!
//! ## Usage
//!
//! ```no_run
//! use hostwatch::storage::{AlertStore, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::new("./hostwatch.db").await?;
//!     let config = store.load_config().await?;
//!     println!("warning at {}%", config.warning_percent);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{AlertStore, HealthStatus, HistoryQuery};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
