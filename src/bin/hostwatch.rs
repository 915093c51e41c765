use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hostwatch::{
    Snapshot,
    alerts::{AlertService, AlertServiceOptions, Notifier},
    config::{AgentConfig, StorageConfig, read_config_file},
    sampler::CpuSampler,
    storage::{AlertStore, MemoryStore},
    util::{get_alerts_key, resolve_hostname},
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Single-host CPU monitoring agent with alerting")]
struct Args {
    /// Config file (JSON); built-in defaults when omitted
    #[arg(short, long)]
    file: Option<String>,

    /// Log everything down to trace level
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new()
        .with_targets(vec![("hostwatch", level)])
        .with_default(LevelFilter::WARN);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_store(config: &AgentConfig) -> anyhow::Result<Arc<dyn AlertStore>> {
    match &config.storage {
        StorageConfig::None => {
            warn!("storage disabled, alert configuration and history are not persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let store = hostwatch::storage::sqlite::SqliteStore::new(path)
                .await
                .with_context(|| format!("failed to open alert store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => AgentConfig::default(),
    };

    let cancel = CancellationToken::new();
    let store = open_store(&config).await?;

    let notifier = Notifier::new().context("failed to build notification channels")?;
    let alerts_key = get_alerts_key();
    let service = AlertService::new(
        Arc::clone(&store),
        notifier,
        alerts_key.as_deref(),
        AlertServiceOptions {
            hostname: resolve_hostname(),
            history_retention_days: config.history_retention_days,
            cleanup_interval: config.cleanup_interval(),
            cancel: cancel.child_token(),
        },
    )
    .await
    .context("failed to start alert service")?;
    let service = Arc::new(service);

    let (snapshot_tx, snapshot_rx) = broadcast::channel::<Snapshot>(SNAPSHOT_CHANNEL_CAPACITY);

    #[cfg(feature = "api")]
    {
        use hostwatch::api::{AccessTokens, ApiConfig, ApiState, spawn_api_server};
        use hostwatch::util::{get_admin_token, get_viewer_token};

        let api_config = ApiConfig {
            bind_addr: config.api.bind_addr,
            tokens: AccessTokens {
                admin: get_admin_token(),
                viewer: get_viewer_token(),
            },
            enable_cors: config.api.enable_cors,
        };
        let state = ApiState::new(Arc::clone(&service), snapshot_tx.clone());
        spawn_api_server(api_config, state, cancel.clone()).await?;
    }

    let sampler = CpuSampler::new(config.sample_interval(), snapshot_tx);
    let sampler_handle = tokio::spawn(sampler.run(cancel.clone()));
    let service_handle = tokio::spawn(Arc::clone(&service).run(snapshot_rx));

    info!(
        hostname = service.hostname(),
        secrets_writable = service.secrets_writable(),
        "hostwatch running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    cancel.cancel();

    if let Err(e) = sampler_handle.await {
        error!("sampler task failed: {e}");
    }
    if let Err(e) = service_handle.await {
        error!("alert service task failed: {e}");
    }
    if let Err(e) = store.close().await {
        error!("failed to close alert store: {e}");
    }

    Ok(())
}
