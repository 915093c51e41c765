//! Health check endpoint

use axum::{Json, extract::State};
use serde::Serialize;

use crate::api::state::ApiState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub storage_healthy: bool,
    pub storage_message: String,
    pub alerts_enabled: bool,
}

/// GET /api/v1/health
///
/// Reports "degraded" when the alert store is unreachable
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let (storage_healthy, storage_message) = match state.service.store_health().await {
        Ok(health) => (health.healthy, health.message),
        Err(e) => (false, e.to_string()),
    };

    Json(HealthResponse {
        status: if storage_healthy { "ok" } else { "degraded" },
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage_healthy,
        storage_message,
        alerts_enabled: state.service.is_enabled().await,
    })
}
