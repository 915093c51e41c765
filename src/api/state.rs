//! API shared state

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::Snapshot;
use crate::alerts::AlertService;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<AlertService>,

    /// Snapshot stream, re-published to WebSocket clients
    pub snapshot_tx: broadcast::Sender<Snapshot>,
}

impl ApiState {
    pub fn new(service: Arc<AlertService>, snapshot_tx: broadcast::Sender<Snapshot>) -> Self {
        Self {
            service,
            snapshot_tx,
        }
    }
}
