//! REST API handlers for the Trellis server

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use tracing::{debug, warn};
use trellis_watcher::Trigger;

use crate::ServerState;

/// Response structure for the diagram API
#[derive(Debug, Serialize)]
pub struct DiagramResponse {
    pub text: String,
    pub revision: u64,
    pub computed_at: String,
}

/// Result of pushing the diagram to a session room
#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub delivered: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: usize,
}

/// Get the current diagram
pub async fn get_diagram(State(state): State<Arc<ServerState>>) -> Json<DiagramResponse> {
    let snapshot = state.pipeline.current();
    Json(DiagramResponse {
        text: snapshot.text.to_string(),
        revision: snapshot.revision,
        computed_at: snapshot.computed_at.to_rfc3339(),
    })
}

/// Queue a recomputation. The result reaches clients over the WebSocket.
pub async fn recompute(State(state): State<Arc<ServerState>>) -> StatusCode {
    if state.pipeline.trigger(Trigger::Requested) {
        StatusCode::ACCEPTED
    } else {
        warn!("Recompute requested but the pipeline is not running");
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Send the current diagram to every member of one session
pub async fn session_diagram(
    State(state): State<Arc<ServerState>>,
    Path(session): Path<String>,
) -> Json<DeliveryResponse> {
    let snapshot = state.pipeline.current();
    let delivered = state.broadcaster.send_diagram_to_session(&session, &snapshot);
    debug!("Diagram pushed to session {:?}: {} recipients", session, delivered);
    Json(DeliveryResponse { delivered })
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: state.broadcaster.connection_count(),
    })
}
