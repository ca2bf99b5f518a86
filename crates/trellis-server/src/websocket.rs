//! WebSocket handling for live diagram updates

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use trellis_watcher::Trigger;

use crate::ServerState;
use crate::broadcaster::ConnectionId;
use crate::protocol::ClientMessage;

/// Handle WebSocket upgrade requests
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (id, mut outbound) = state.broadcaster.connect();
    info!("WebSocket connection {} established", id);

    // Catch the client up before anything else is queued for it. Nothing is
    // sent while no pass has succeeded yet.
    let current = state.pipeline.current();
    if !state.broadcaster.send_diagram_to(id, &current) {
        debug!("No diagram to catch up connection {}", id);
    }
    if !state.pipeline.trigger(Trigger::ClientAttached(id)) {
        warn!("Recomputation pipeline is not running");
    }

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                debug!("Failed to send message to WebSocket client");
                break;
            }
        }
    });

    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!("Received WebSocket message: {}", text);
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => handle_client_message(message, id, &recv_state),
                        Err(e) => warn!("Ignoring unrecognized WebSocket message: {}", e),
                    }
                }
                Message::Close(_) => {
                    debug!("WebSocket client {} sent close", id);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
            // A join handled after this point would outlive the disconnect.
            let _ = recv_task.await;
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    state.broadcaster.disconnect(id);
    info!("WebSocket connection {} closed", id);
}

fn handle_client_message(message: ClientMessage, id: ConnectionId, state: &ServerState) {
    match message {
        ClientMessage::JoinSession(session) => {
            if state.broadcaster.join(id, &session) {
                info!("Connection {} joined session {:?}", id, session);
            }
        }
    }
}
