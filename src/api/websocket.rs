//! WebSocket handler for live snapshot and alert status streaming

use axum::{
    Extension,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::api::middleware::Access;
use crate::api::state::ApiState;

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Extension(access): Extension<Access>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state, access.is_read_only()))
}

/// Forward every snapshot, together with the alert status it produced
async fn handle_websocket(socket: WebSocket, state: ApiState, read_only: bool) {
    info!("WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut snapshot_rx = state.snapshot_tx.subscribe();
    let service = state.service.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            let snapshot = match snapshot_rx.recv().await {
                Ok(snapshot) => snapshot,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagged, skipped {} snapshots", skipped);
                    continue;
                }
                Err(RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            };

            let json = serde_json::json!({
                "type": "snapshot",
                "timestamp": snapshot.timestamp.to_rfc3339(),
                "cpu_total_percent": snapshot.cpu_total_percent,
                "alerts": service.status(read_only).await,
            });

            if let Ok(text) = serde_json::to_string(&json)
                && sender.send(Message::Text(text)).await.is_err()
            {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket client disconnected");
}
