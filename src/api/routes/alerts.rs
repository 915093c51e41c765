//! Alert configuration, status, silence, history and test endpoints

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::alerts::{AlertEvent, AlertStatus, ConfigView, UpdateConfigInput};
use crate::api::error::{ApiError, ApiResult};
use crate::api::middleware::Access;
use crate::api::state::ApiState;

fn require_admin(access: Access) -> ApiResult<()> {
    if access.is_read_only() {
        return Err(ApiError::Forbidden(
            "read-only access cannot modify alerts".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/v1/alerts/config
pub async fn get_config(
    State(state): State<ApiState>,
    Extension(access): Extension<Access>,
) -> Json<ConfigView> {
    Json(state.service.config_view(access.is_read_only()).await)
}

/// PUT /api/v1/alerts/config
///
/// Partial update; absent fields are left unchanged
#[instrument(skip_all)]
pub async fn update_config(
    State(state): State<ApiState>,
    Extension(access): Extension<Access>,
    Json(input): Json<UpdateConfigInput>,
) -> ApiResult<Json<ConfigView>> {
    require_admin(access)?;
    Ok(Json(state.service.update_config(input).await?))
}

/// GET /api/v1/alerts/status
pub async fn get_status(
    State(state): State<ApiState>,
    Extension(access): Extension<Access>,
) -> Json<AlertStatus> {
    Json(state.service.status(access.is_read_only()).await)
}

#[derive(Debug, Deserialize)]
pub struct SilenceRequest {
    pub minutes: i64,
}

/// POST /api/v1/alerts/silence
pub async fn set_silence(
    State(state): State<ApiState>,
    Extension(access): Extension<Access>,
    Json(request): Json<SilenceRequest>,
) -> ApiResult<Json<AlertStatus>> {
    require_admin(access)?;
    state.service.set_silence(request.minutes).await?;
    Ok(Json(state.service.status(false).await))
}

/// DELETE /api/v1/alerts/silence
pub async fn clear_silence(
    State(state): State<ApiState>,
    Extension(access): Extension<Access>,
) -> ApiResult<Json<AlertStatus>> {
    require_admin(access)?;
    state.service.clear_silence().await?;
    Ok(Json(state.service.status(false).await))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub before_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub events: Vec<AlertEvent>,
    pub retention_days: u32,
}

/// GET /api/v1/alerts/history?limit=&before_id=
pub async fn get_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let events = state
        .service
        .list_history(params.limit.unwrap_or_default(), params.before_id)
        .await?;

    Ok(Json(HistoryResponse {
        events,
        retention_days: state.service.history_retention_days(),
    }))
}

/// POST /api/v1/alerts/test
#[instrument(skip_all)]
pub async fn trigger_test(
    State(state): State<ApiState>,
    Extension(access): Extension<Access>,
) -> ApiResult<Json<AlertEvent>> {
    require_admin(access)?;
    Ok(Json(state.service.trigger_test().await?))
}
