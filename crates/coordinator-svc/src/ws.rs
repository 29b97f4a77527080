//! Worker WebSocket attachment
//!
//! Workers hold a socket open to receive commands; text frames they send
//! back are parsed as progress reports and ingested. A freshly attached
//! worker first gets the unexpired command history, so a command published
//! moments before the attachment is not lost.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::AppState;

/// Upgrade a worker connection
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut commands = state.bus.subscribe();

    debug!(workers = state.bus.subscriber_count(), "Worker attached");

    // Replay history before going live
    for published in state.bus.recent() {
        match worker_bus::encode_frame(&published.command) {
            Ok(frame) => {
                if sender.send(Message::Text(frame)).await.is_err() {
                    return;
                }
            }
            Err(err) => warn!(seq = published.seq, error = %err, "Failed to encode command frame"),
        }
    }

    let forward = tokio::spawn(async move {
        loop {
            match commands.recv().await {
                Ok(command) => match worker_bus::encode_frame(&command) {
                    Ok(frame) => {
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "Failed to encode command frame"),
                },
                // A slow worker missed broadcasts; it can re-fetch via history
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Worker connection lagged behind command fan-out");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(err) = state.coordinator.on_raw_event(text.as_bytes()) {
                    warn!(error = %err, "Dropping worker event");
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    forward.abort();
    debug!("Worker detached");
}
