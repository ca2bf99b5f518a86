//! Axum router setup for the Trellis server

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    ServerState,
    handlers::{get_diagram, health_check, recompute, session_diagram},
    websocket::ws_handler,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/diagram", get(get_diagram))
        .route("/api/recompute", post(recompute))
        .route("/api/sessions/:id/diagram", post(session_diagram))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
