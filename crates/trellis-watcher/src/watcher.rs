//! Filesystem watcher implementation

use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::event::{CreateKind, ModifyKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use trellis_indexer::project::is_dot_path;
use tracing::{debug, error, info, warn};

use crate::pipeline::{PipelineHandle, Trigger};

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A regular file was written
    Changed(PathBuf),
}

/// Decides which raw notify paths are reported.
#[derive(Debug, Clone)]
struct PathFilter {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
}

impl PathFilter {
    fn new(root: &Path) -> Self {
        PathFilter {
            root: root.to_path_buf(),
            canonical_root: std::fs::canonicalize(root).ok(),
        }
    }

    /// Path relative to the watched root. Backends may report either the
    /// configured or the canonical form of the root.
    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok().or_else(|| {
            self.canonical_root
                .as_ref()
                .and_then(|root| path.strip_prefix(root).ok())
        })
    }

    fn accepts(&self, path: &Path) -> bool {
        match self.relative(path) {
            Some(relative) => !is_dot_path(relative) && path.is_file(),
            None => false,
        }
    }
}

/// File system watcher for monitoring code changes
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root path
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let filter = PathFilter::new(&root_path);

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    Self::handle_notify_event(event, &filter, &event_tx);
                }
                Err(e) => {
                    error!("File system watch error: {}", e);
                }
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            root_path,
        })
    }

    /// Convert a notify event into change events. Only writes to regular
    /// files outside dot-directories are reported; editors that save by
    /// rename show up as creates, so those count as writes too.
    fn handle_notify_event(
        event: notify::Event,
        filter: &PathFilter,
        event_tx: &mpsc::UnboundedSender<WatchEvent>,
    ) {
        let is_write = match event.kind {
            EventKind::Create(CreateKind::File | CreateKind::Any) => true,
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) => true,
            _ => false,
        };
        if !is_write {
            return;
        }

        for path in event.paths {
            if !filter.accepts(&path) {
                continue;
            }
            if let Err(e) = event_tx.send(WatchEvent::Changed(path)) {
                warn!("Failed to send change event: {}", e);
            }
        }
    }

    /// Watch the root directory recursively
    pub fn start(&mut self) -> Result<()> {
        info!("Watching directory: {:?}", self.root_path);
        self.watcher.watch(&self.root_path, RecursiveMode::Recursive)?;
        Ok(())
    }

    /// Get the event receiver
    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

/// Forwards watcher events to the recomputation pipeline
pub struct WatcherService {
    watcher: FileWatcher,
    pipeline: PipelineHandle,
}

impl WatcherService {
    pub fn new(root_path: impl AsRef<Path>, pipeline: PipelineHandle) -> Result<Self> {
        Ok(Self {
            watcher: FileWatcher::new(root_path)?,
            pipeline,
        })
    }

    /// Start watching the project directory
    pub fn start_watching(&mut self) -> Result<()> {
        self.watcher.start()?;
        info!("Started watching project directory: {:?}", self.watcher.root_path());
        Ok(())
    }

    /// Forward change events until the watcher or the pipeline goes away
    pub async fn process_events(&mut self) -> Result<()> {
        while let Some(event) = self.watcher.event_receiver().recv().await {
            let WatchEvent::Changed(path) = event;
            info!("File changed: {:?}", path);
            if !self.pipeline.trigger(Trigger::FileChanged(path)) {
                warn!("Recomputation pipeline stopped, no longer forwarding changes");
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind, RemoveKind};
    use tempfile::TempDir;
    use tokio::time::{Duration, timeout};

    fn collect(event: notify::Event, root: &Path) -> Vec<WatchEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        FileWatcher::handle_notify_event(event, &PathFilter::new(root), &tx);
        drop(tx);
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_file_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(temp_dir.path());
        assert!(watcher.is_ok());
    }

    #[test]
    fn test_modify_reported() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("shape.ts");
        std::fs::write(&file, "class Shape {}").unwrap();

        let event = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(file.clone());
        assert_eq!(collect(event, dir.path()), vec![WatchEvent::Changed(file)]);
    }

    #[test]
    fn test_dot_paths_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let hidden = dir.path().join(".git/index");
        let dotfile = dir.path().join(".eslintrc.ts");
        std::fs::write(&hidden, "x").unwrap();
        std::fs::write(&dotfile, "x").unwrap();

        let event = notify::Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(hidden)
            .add_path(dotfile);
        assert!(collect(event, dir.path()).is_empty());
    }

    #[test]
    fn test_non_writes_ignored() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "").unwrap();
        let subdir = dir.path().join("src");
        std::fs::create_dir(&subdir).unwrap();

        let metadata_kind = EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any));
        let metadata = notify::Event::new(metadata_kind).add_path(file.clone());
        let removed = notify::Event::new(EventKind::Remove(RemoveKind::File)).add_path(file);
        let directory = notify::Event::new(EventKind::Create(CreateKind::Any)).add_path(subdir);

        assert!(collect(metadata, dir.path()).is_empty());
        assert!(collect(removed, dir.path()).is_empty());
        assert!(collect(directory, dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_watch_events() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("test.ts");
        std::fs::write(&test_file, "class A {}").unwrap();

        let mut watcher = FileWatcher::new(temp_dir.path()).unwrap();
        watcher.start().unwrap();

        std::fs::write(&test_file, "class A { run(): void {} }").unwrap();

        let received = timeout(Duration::from_secs(5), watcher.event_receiver().recv())
            .await
            .expect("no change event within timeout")
            .unwrap();
        let WatchEvent::Changed(path) = received;
        assert_eq!(path.file_name(), test_file.file_name());
    }
}
