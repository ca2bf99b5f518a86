//! Change watching and the recomputation pipeline

pub mod pipeline;
pub mod watcher;

pub use pipeline::{DiagramSink, Pipeline, PipelineConfig, PipelineHandle, RecomputeError, Trigger};
pub use watcher::{FileWatcher, WatchEvent, WatcherService};
