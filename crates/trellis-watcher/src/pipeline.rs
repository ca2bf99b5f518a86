//! Recomputation pipeline: extract, render, publish
//!
//! Every trigger (file change, client attach, explicit request) goes through
//! one queue consumed by a single task, so at most one recomputation runs at
//! a time and passes complete in the order they were started. The pipeline
//! is the only writer of the [`DiagramCell`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use trellis_core::{DiagramCell, DiagramReader, DiagramSnapshot, Extraction, FileFailure, render};
use trellis_indexer::{Coordinator, ProjectError};

/// Why a recomputation should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    FileChanged(PathBuf),
    ClientAttached(u64),
    /// Requested by a collaborator rather than by a change or a client.
    Requested,
}

/// A whole pass failed; the previous snapshot stays current.
#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error("recomputation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Receives the outcome of every pass.
pub trait DiagramSink: Send + Sync + 'static {
    /// A new snapshot was published.
    fn diagram_updated(&self, snapshot: &DiagramSnapshot);
    /// The pass failed, or only partially succeeded.
    fn recompute_failed(&self, message: &str);
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long to wait after a file change for more changes to arrive.
    pub debounce: Duration,
    pub recompute_on_attach: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            debounce: Duration::from_millis(100),
            recompute_on_attach: true,
        }
    }
}

/// Cloneable handle for submitting triggers and reading the snapshot.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<Trigger>,
    reader: DiagramReader,
}

impl PipelineHandle {
    /// Queue a trigger. Returns `false` once the pipeline has stopped.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.tx.send(trigger).is_ok()
    }

    pub fn current(&self) -> Arc<DiagramSnapshot> {
        self.reader.current()
    }
}

pub struct Pipeline {
    coordinator: Arc<Coordinator>,
    cell: DiagramCell,
    sink: Arc<dyn DiagramSink>,
    rx: mpsc::UnboundedReceiver<Trigger>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Build the pipeline and run the initial pass before any trigger is
    /// accepted. The returned pipeline still has to be driven with [`run`].
    ///
    /// [`run`]: Pipeline::run
    pub async fn start(
        coordinator: Coordinator,
        sink: Arc<dyn DiagramSink>,
        config: PipelineConfig,
    ) -> (Self, PipelineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cell = DiagramCell::new();
        let handle = PipelineHandle {
            tx,
            reader: cell.reader(),
        };

        let pipeline = Pipeline {
            coordinator: Arc::new(coordinator),
            cell,
            sink,
            rx,
            config,
        };

        info!("Initial recomputation for {}", pipeline.coordinator.descriptor().display());
        pipeline.run_pass().await;

        (pipeline, handle)
    }

    /// Process triggers until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(trigger) = self.rx.recv().await {
            debug!("Recomputation trigger: {:?}", trigger);

            if matches!(trigger, Trigger::FileChanged(_)) && !self.config.debounce.is_zero() {
                tokio::time::sleep(self.config.debounce).await;
            }

            // Everything queued so far is covered by the pass about to run.
            let mut wanted = self.wants_pass(&trigger);
            let mut coalesced = 0usize;
            while let Ok(queued) = self.rx.try_recv() {
                wanted |= self.wants_pass(&queued);
                coalesced += 1;
            }
            if coalesced > 0 {
                debug!("Coalesced {} queued triggers into one pass", coalesced);
            }

            if wanted {
                self.run_pass().await;
            }
        }

        info!("Recomputation pipeline stopped");
    }

    fn wants_pass(&self, trigger: &Trigger) -> bool {
        match trigger {
            Trigger::ClientAttached(_) => self.config.recompute_on_attach,
            Trigger::FileChanged(_) | Trigger::Requested => true,
        }
    }

    async fn run_pass(&self) {
        match self.recompute().await {
            Ok((snapshot, failures)) => {
                info!("Published diagram revision {}", snapshot.revision);
                self.sink.diagram_updated(&snapshot);
                if !failures.is_empty() {
                    warn!("{} files could not be parsed", failures.len());
                    self.sink.recompute_failed(&partial_failure_message(&failures));
                }
            }
            Err(e) => {
                error!("Recomputation failed: {}", e);
                self.sink.recompute_failed(&format!("Recomputation failed: {}", e));
            }
        }
    }

    /// Extract and render, then publish. Nothing is published on error.
    async fn recompute(&self) -> Result<(Arc<DiagramSnapshot>, Vec<FileFailure>), RecomputeError> {
        let coordinator = Arc::clone(&self.coordinator);
        let Extraction { model, failures } =
            tokio::task::spawn_blocking(move || coordinator.run_full_index()).await??;

        let text = render(&model);
        Ok((self.cell.publish(text), failures))
    }
}

fn partial_failure_message(failures: &[FileFailure]) -> String {
    let details = failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "Diagram is incomplete, {} file(s) failed to parse: {}",
        failures.len(),
        details
    )
}
