use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

fn snapshot_json(state: &AppState) -> Option<String> {
    let payload = json!({
        "type": "snapshot",
        "snapshot": state.dashboard.snapshot(),
    });
    match serde_json::to_string(&payload) {
        Ok(json) => Some(json),
        Err(err) => {
            warn!(error = %err, "failed to serialize dashboard snapshot for ws");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the snapshot so nothing falls between the two.
    let mut events = BroadcastStream::new(state.dashboard.subscribe_events());

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        if let Some(json) = snapshot_json(&state) {
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }

        while let Some(next) = events.next().await {
            let json = match next {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize dashboard event for ws");
                        continue;
                    }
                },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "ws client lagged; resending snapshot");
                    match snapshot_json(&state) {
                        Some(json) => json,
                        None => continue,
                    }
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

    info!("websocket client disconnected");
}
