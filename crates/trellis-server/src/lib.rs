//! HTTP + WebSocket server

pub mod broadcaster;
pub mod handlers;
pub mod protocol;
pub mod router;
pub mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use trellis_watcher::PipelineHandle;

pub use broadcaster::{Broadcaster, ClientReceiver, ConnectionId};
pub use protocol::{ClientMessage, ServerMessage};

/// State shared by every request handler
pub struct ServerState {
    pub broadcaster: Arc<Broadcaster>,
    pub pipeline: PipelineHandle,
}

impl ServerState {
    pub fn new(broadcaster: Arc<Broadcaster>, pipeline: PipelineHandle) -> Self {
        Self {
            broadcaster,
            pipeline,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

pub struct TrellisServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl TrellisServer {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        pipeline: PipelineHandle,
        config: ServerConfig,
    ) -> Self {
        Self {
            state: Arc::new(ServerState::new(broadcaster, pipeline)),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind the configured address and serve until the process exits
    pub async fn start(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        info!("Trellis server listening on http://{}", addr);
        let app = router::create_router(self.state);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use tempfile::TempDir;
    use trellis_indexer::Coordinator;
    use trellis_watcher::{Pipeline, PipelineConfig};

    async fn test_state(dir: &TempDir) -> (Pipeline, Arc<ServerState>) {
        std::fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.ts"), "class A { run(): void {} }").unwrap();

        let broadcaster = Arc::new(Broadcaster::new());
        let coordinator = Coordinator::new(dir.path().join("tsconfig.json"));
        let (pipeline, handle) =
            Pipeline::start(coordinator, broadcaster.clone(), PipelineConfig::default()).await;
        (pipeline, Arc::new(ServerState::new(broadcaster, handle)))
    }

    #[tokio::test]
    async fn test_router_creation() {
        let dir = TempDir::new().unwrap();
        let (_pipeline, state) = test_state(&dir).await;
        let _router = router::create_router(state);
    }

    #[tokio::test]
    async fn test_get_diagram_returns_current_snapshot() {
        let dir = TempDir::new().unwrap();
        let (_pipeline, state) = test_state(&dir).await;

        let axum::Json(response) = handlers::get_diagram(State(state)).await;
        assert_eq!(response.revision, 1);
        assert_eq!(response.text, "@startuml\nclass A {\n  run(): void\n}\n@enduml");
    }

    #[tokio::test]
    async fn test_recompute_accepted_while_pipeline_alive() {
        let dir = TempDir::new().unwrap();
        let (pipeline, state) = test_state(&dir).await;

        assert_eq!(handlers::recompute(State(state.clone())).await, StatusCode::ACCEPTED);
        drop(pipeline);
        assert_eq!(
            handlers::recompute(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_session_diagram_reaches_members_only() {
        let dir = TempDir::new().unwrap();
        let (_pipeline, state) = test_state(&dir).await;
        let (member, mut member_rx) = state.broadcaster.connect();
        let (_other, mut other_rx) = state.broadcaster.connect();
        state.broadcaster.join(member, "X");

        let axum::Json(response) =
            handlers::session_diagram(State(state), Path("X".to_string())).await;
        assert_eq!(response.delivered, 1);
        assert!(matches!(member_rx.try_recv(), Some(ServerMessage::UmlUpdate(_))));
        assert_eq!(other_rx.try_recv(), None);
    }
}
