//! JavaScript language extractor using tree-sitter

use std::path::Path;

use trellis_core::StructuralModel;

use super::typescript::extract_with;
use crate::extractor::{ExtractError, LanguageExtractor};
use crate::parser_pool::{FileType, ParserPool};

/// Extracts classes from `.js`-family files (only used when the project
/// descriptor sets `allowJs`). Parameters carry no annotations, so every
/// parameter renders as `any`.
pub struct JavaScriptExtractor {
    parser_pool: ParserPool,
}

impl JavaScriptExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }
}

impl LanguageExtractor for JavaScriptExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<StructuralModel, ExtractError> {
        extract_with(&self.parser_pool, FileType::JavaScript, path, content)
    }
}
