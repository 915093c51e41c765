//! CpuSampler - publishes host CPU snapshots
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → refresh sysinfo → Snapshot → broadcast → [AlertService, WebSocket clients, ...]
//! ```

use std::time::Duration;

use chrono::Utc;
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::Snapshot;

/// Samples total CPU usage at a fixed cadence until cancelled.
pub struct CpuSampler {
    system: System,
    interval: Duration,
    snapshot_tx: broadcast::Sender<Snapshot>,
}

impl CpuSampler {
    pub fn new(interval: Duration, snapshot_tx: broadcast::Sender<Snapshot>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()),
        );
        Self {
            system,
            interval: interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
            snapshot_tx,
        }
    }

    /// Take one reading. Usage is measured since the previous refresh.
    pub fn sample(&mut self) -> Snapshot {
        self.system.refresh_cpu_usage();
        let cpu = f64::from(self.system.global_cpu_usage()).clamp(0.0, 100.0);
        Snapshot::new(Utc::now(), cpu)
    }

    #[instrument(skip_all, fields(interval = ?self.interval))]
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!("starting cpu sampler");

        // The first refresh only establishes the baseline.
        self.system.refresh_cpu_usage();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("cpu sampler cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let snapshot = self.sample();
                    trace!(cpu = snapshot.cpu_total_percent, "sampled cpu");
                    // No subscribers is fine, the sample is simply dropped.
                    let _ = self.snapshot_tx.send(snapshot);
                }
            }
        }
    }
}
