//! REST API and WebSocket server for the alerting engine
//!
//! A thin layer over [`AlertService`](crate::alerts::AlertService): handlers
//! only translate between HTTP and service calls.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check (no authentication)
//! - `GET|PUT /api/v1/alerts/config` - Alert configuration
//! - `GET /api/v1/alerts/status` - Current alert level and silence state
//! - `POST|DELETE /api/v1/alerts/silence` - Silence notifications
//! - `GET /api/v1/alerts/history` - Alert event history
//! - `POST /api/v1/alerts/test` - Send a test notification
//! - `WS /api/v1/stream` - Live snapshots with alert status
//!
//! ## Access
//!
//! Without configured tokens every caller is an admin. Otherwise the admin
//! token grants full access and the viewer token read-only access.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use middleware::{Access, AccessTokens};
pub use state::ApiState;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    pub tokens: AccessTokens,

    /// Enable CORS for dashboard
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            tokens: AccessTokens::default(),
            enable_cors: true,
        }
    }
}

/// Build the application router
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    use routes::alerts;

    let protected = Router::new()
        .route(
            "/api/v1/alerts/config",
            get(alerts::get_config).put(alerts::update_config),
        )
        .route("/api/v1/alerts/status", get(alerts::get_status))
        .route(
            "/api/v1/alerts/silence",
            post(alerts::set_silence).delete(alerts::clear_silence),
        )
        .route("/api/v1/alerts/history", get(alerts::get_history))
        .route("/api/v1/alerts/test", post(alerts::trigger_test))
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::new(config.tokens.clone()),
            middleware::access_middleware,
        ));

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task that stops when
/// `cancel` fires. Returns the server's local address.
pub async fn spawn_api_server(
    config: ApiConfig,
    state: ApiState,
    cancel: CancellationToken,
) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
