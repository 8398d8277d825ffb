use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::SinkExt;
use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notify::broadcast::UpdateStream;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/trips/:id", get(trip_updates))
        .route("/ws/couriers/:id/assignments", get(courier_assignments))
}

async fn trip_updates(
    ws: WebSocketUpgrade,
    Path(trip_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let feed = state.bus.subscribe_trip_updates(trip_id);
    ws.on_upgrade(move |socket| forward(socket, feed, "trip-updates"))
}

async fn courier_assignments(
    ws: WebSocketUpgrade,
    Path(courier_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let feed = state.bus.subscribe_assignments(courier_id);
    ws.on_upgrade(move |socket| forward(socket, feed, "assignment"))
}

async fn forward(socket: WebSocket, mut feed: UpdateStream, channel: &'static str) {
    let (mut sender, mut receiver) = socket.split();

    info!(channel, "websocket subscriber connected");

    let send_task = tokio::spawn(async move {
        while let Some(update) = feed.next().await {
            let json = match serde_json::to_string(&update) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize trip update for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(channel, "websocket subscriber disconnected");
}
