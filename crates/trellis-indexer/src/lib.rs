//! Project loading, parsing and class extraction

pub mod cache;
pub mod coordinator;
pub mod extractor;
pub mod languages;
pub mod parser_pool;
pub mod project;
pub mod syntax;


pub use cache::{ContentHash, ExtractionCache};
pub use coordinator::Coordinator;
pub use extractor::{ExtractError, LanguageExtractor, build_model};
pub use parser_pool::{FileType, ParseRequest, ParseResult, ParserPool, create_parser_pool};
pub use project::{Project, ProjectError};
pub use syntax::{ClassDecl, MethodDecl, Parameter};
