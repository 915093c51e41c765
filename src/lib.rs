pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod sampler;
pub mod storage;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resource-usage sample fed into the alert service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_total_percent: f64,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, cpu_total_percent: f64) -> Self {
        Self {
            timestamp,
            cpu_total_percent,
        }
    }
}
