//! Language extractors for the project's source files

pub mod javascript;
pub mod typescript;

use std::path::Path;

use crate::extractor::LanguageExtractor;
use crate::parser_pool::{FileType, ParserPool};

/// Get the appropriate extractor for a file based on its extension
pub fn get_extractor(path: &Path, parser_pool: &ParserPool) -> Option<Box<dyn LanguageExtractor>> {
    let extractor: Box<dyn LanguageExtractor> = match FileType::from_path(path)? {
        FileType::TypeScript => Box::new(typescript::TypeScriptExtractor::new(parser_pool.clone())),
        FileType::Tsx => Box::new(typescript::TypeScriptExtractor::tsx(parser_pool.clone())),
        FileType::JavaScript => Box::new(javascript::JavaScriptExtractor::new(parser_pool.clone())),
    };
    Some(extractor)
}
