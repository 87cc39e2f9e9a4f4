//! WebSocket handler for real-time station event streaming.
//!
//! The `/ws/events` endpoint upgrades an HTTP connection to a WebSocket.
//! Once connected, the handler:
//!
//! - **Forwards events:** Subscribes to the [`EventBus`] on [`AppState`] and
//!   pushes every [`StationEvent`] to the client as a JSON text frame.
//! - **Answers pings:** `{"type":"ping"}` gets `{"type":"pong"}` back.
//!
//! Lagged receivers (when the client is too slow to keep up) log a warning
//! and keep receiving.
//!
//! [`EventBus`]: hydrowatch_core::event::EventBus
//! [`StationEvent`]: hydrowatch_types::event::StationEvent

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::state::AppState;

/// Incoming command from a WebSocket client.
///
/// Unknown or malformed messages are logged and ignored.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    Ping,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut event_rx = state.bus.subscribe();

    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }

            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => {
                            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => tracing::warn!("Failed to serialize StationEvent: {err}"),
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "WebSocket subscriber lagged, skipping {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = process_command(&text) {
                            if ws_sender.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Protocol-level ping/pong frames are handled by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("WebSocket connection closed");
}

/// Reply frame for a client command, if any.
fn process_command(text: &str) -> Option<String> {
    match serde_json::from_str::<WsCommand>(text) {
        Ok(WsCommand::Ping) => Some(serde_json::json!({"type": "pong"}).to_string()),
        Err(err) => {
            tracing::debug!("Ignoring malformed WebSocket command: {err}");
            None
        }
    }
}
