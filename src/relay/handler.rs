//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and drives one connection's lifecycle:
//! register on accept, feed frames to the relay in arrival order, unregister
//! on close.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::messages::ServerMessage;
use super::protocol::Relay;
use super::registry::ConnectionId;
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// Entry point for chat clients on `GET /ws`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let relay = Arc::clone(&state.relay);
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, relay: Arc<Relay>) {
    let (mut sender, mut receiver) = socket.split();

    // Outbound queue for this connection; fan-out writes here
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match relay.connect(tx).await {
        Ok((id, _)) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register WebSocket connection");
            return;
        }
    };

    // Task to forward queued messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        tracing::debug!(
                            connection_id = %connection_id,
                            "WebSocket send failed, closing connection"
                        );
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                }
            }
        }
    });

    let relay_for_recv = Arc::clone(&relay);

    // Task to read frames; one at a time so per-connection order holds
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&relay_for_recv, connection_id, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    relay.disconnect(connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(
    relay: &Relay,
    connection_id: ConnectionId,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            relay.handle_frame(connection_id, text.as_bytes()).await;
            true
        }
        Message::Binary(data) => {
            relay.handle_frame(connection_id, &data).await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            // Axum answers pings itself
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}
