//! Per-file extraction cache keyed by content hash

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use trellis_core::StructuralModel;

/// A 256-bit blake3 digest of a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

/// Hash of a file's bytes, used to detect unchanged files between passes.
pub fn content_hash(content: &[u8]) -> ContentHash {
    ContentHash(*blake3::hash(content).as_bytes())
}

struct CachedFile {
    hash: ContentHash,
    model: StructuralModel,
}

/// Extraction results of the last pass, one entry per file. Thread-safe for
/// concurrent access.
#[derive(Default)]
pub struct ExtractionCache {
    files: DashMap<PathBuf, CachedFile>,
    hits: AtomicU64,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached model for `path` if its content hash is unchanged.
    pub fn get(&self, path: &Path, hash: ContentHash) -> Option<StructuralModel> {
        let entry = self.files.get(path)?;
        if entry.hash != hash {
            return None;
        }
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.model.clone())
    }

    pub fn insert(&self, path: &Path, hash: ContentHash, model: StructuralModel) {
        self.files.insert(path.to_path_buf(), CachedFile { hash, model });
    }

    pub fn remove(&self, path: &Path) {
        self.files.remove(path);
    }

    /// Drop entries for files that are no longer part of the project.
    pub fn retain_files(&self, files: &[PathBuf]) {
        let keep: HashSet<&PathBuf> = files.iter().collect();
        self.files.retain(|path, _| keep.contains(path));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of lookups served from the cache so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}
