//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use trellis_core::Settings;
use trellis_indexer::Coordinator;
use trellis_server::{Broadcaster, ServerConfig, TrellisServer};
use trellis_watcher::{Pipeline, PipelineConfig, WatcherService};

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Project descriptor (defaults to tsconfig.json in the root)
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Milliseconds to wait for more file changes before recomputing
    #[arg(long)]
    pub debounce_ms: Option<u64>,
}

impl ServeArgs {
    /// Command-line values take precedence over `trellis.toml`.
    fn apply(&self, settings: &mut Settings) {
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(host) = &self.host {
            settings.server.host = host.clone();
        }
        if let Some(project) = &self.project {
            settings.project.descriptor = project.clone();
        }
        if let Some(debounce_ms) = self.debounce_ms {
            settings.project.debounce_ms = debounce_ms;
        }
    }
}

pub async fn serve(root: PathBuf, args: ServeArgs) -> anyhow::Result<()> {
    let mut settings = Settings::load(&root)?;
    args.apply(&mut settings);

    let descriptor = settings.descriptor_path(&root);
    tracing::info!("Trellis v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Project root: {}", root.display());
    tracing::info!("Project descriptor: {}", descriptor.display());

    let broadcaster = Arc::new(Broadcaster::new());
    let config = PipelineConfig {
        debounce: Duration::from_millis(settings.project.debounce_ms),
        recompute_on_attach: settings.project.recompute_on_attach,
    };
    let (pipeline, handle) =
        Pipeline::start(Coordinator::new(descriptor), broadcaster.clone(), config).await;
    tokio::spawn(pipeline.run());

    let mut watcher = WatcherService::new(&root, handle.clone())?;
    watcher.start_watching()?;
    tokio::spawn(async move {
        if let Err(e) = watcher.process_events().await {
            tracing::error!("File watcher error: {}", e);
        }
    });

    let config = ServerConfig {
        host: settings.server.host,
        port: settings.server.port,
    };
    TrellisServer::new(broadcaster, handle, config).start().await
}

/// Run one extraction pass and print the diagram to stdout.
pub async fn render(root: PathBuf, project: Option<PathBuf>) -> anyhow::Result<()> {
    let descriptor = descriptor_for(&root, project)?;
    tracing::info!("Rendering {}", descriptor.display());

    let coordinator = Coordinator::new(descriptor);
    let extraction = tokio::task::spawn_blocking(move || coordinator.run_full_index()).await??;

    if extraction.is_partial() {
        tracing::warn!("{} files could not be parsed", extraction.failures.len());
        for failure in &extraction.failures {
            tracing::warn!("Skipped {}", failure);
        }
    }
    tracing::info!(
        "Rendered {} classes, {} relationships",
        extraction.model.classes.len(),
        extraction.model.relationships.len()
    );

    println!("{}", trellis_core::render(&extraction.model));
    Ok(())
}

fn descriptor_for(root: &Path, project: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let mut settings = Settings::load(root)?;
    if let Some(project) = project {
        settings.project.descriptor = project;
    }
    Ok(settings.descriptor_path(root))
}
