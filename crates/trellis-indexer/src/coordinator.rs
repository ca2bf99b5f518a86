//! Orchestrates one extraction pass over a project

use std::path::{Path, PathBuf};

use trellis_core::{Extraction, FileFailure, StructuralModel};

use crate::cache::{ExtractionCache, content_hash};
use crate::extractor::ExtractError;
use crate::languages::get_extractor;
use crate::parser_pool::{ParserPool, create_parser_pool};
use crate::project::{Project, ProjectError};

/// Runs extraction passes for one project descriptor, reusing results for
/// files whose content did not change since the previous pass.
pub struct Coordinator {
    descriptor: PathBuf,
    parser_pool: ParserPool,
    cache: ExtractionCache,
}

impl Coordinator {
    pub fn new(descriptor: impl Into<PathBuf>) -> Self {
        Self::with_parser_pool(descriptor, create_parser_pool())
    }

    pub fn with_parser_pool(descriptor: impl Into<PathBuf>, parser_pool: ParserPool) -> Self {
        Coordinator {
            descriptor: descriptor.into(),
            parser_pool,
            cache: ExtractionCache::new(),
        }
    }

    pub fn descriptor(&self) -> &Path {
        &self.descriptor
    }

    pub fn cache(&self) -> &ExtractionCache {
        &self.cache
    }

    /// Load the project and extract every file in order.
    ///
    /// Only a descriptor problem fails the whole pass. A file that cannot be
    /// read or parsed is recorded in [`Extraction::failures`] and skipped.
    pub fn run_full_index(&self) -> Result<Extraction, ProjectError> {
        let project = Project::load(&self.descriptor)?;
        self.cache.retain_files(&project.files);

        let mut extraction = Extraction::default();
        for path in &project.files {
            match self.extract_file(path) {
                Ok(model) => extraction.model.extend(model),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    self.cache.remove(path);
                    extraction.failures.push(FileFailure {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            "Extracted {} classes, {} relationships from {} files ({} failed)",
            extraction.model.classes.len(),
            extraction.model.relationships.len(),
            project.files.len(),
            extraction.failures.len()
        );

        Ok(extraction)
    }

    fn extract_file(&self, path: &Path) -> Result<StructuralModel, ExtractError> {
        let content = std::fs::read(path)?;
        let hash = content_hash(&content);

        if let Some(model) = self.cache.get(path, hash) {
            return Ok(model);
        }

        let extractor = get_extractor(path, &self.parser_pool).ok_or(ExtractError::Unsupported)?;
        let model = extractor.extract(path, &content)?;
        self.cache.insert(path, hash, model.clone());
        Ok(model)
    }
}
