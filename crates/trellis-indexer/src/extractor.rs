//! Language extractor trait and model building

use std::path::Path;

use thiserror::Error;
use trellis_core::{ClassEntry, MethodSignature, Relationship, StructuralModel, display_name};

use crate::syntax::{ClassDecl, MethodDecl};

/// Why a single file contributed nothing to the model.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
    #[error("unsupported file type")]
    Unsupported,
    #[error("parser failure: {0}")]
    Parser(String),
}

pub trait LanguageExtractor: Send + Sync {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<StructuralModel, ExtractError>;
}

/// Build a model from class declarations, keeping their order.
///
/// Each class yields one entry and at most one inheritance edge.
pub fn build_model<C, I>(classes: I) -> StructuralModel
where
    C: ClassDecl,
    I: IntoIterator<Item = C>,
{
    let mut model = StructuralModel::new();

    for class in classes {
        let name = display_name(class.name().as_deref());
        let methods = class.methods().iter().map(method_signature).collect();

        if let Some(base) = class.base_name() {
            model.relationships.push(Relationship {
                from: name.clone(),
                to: base,
            });
        }

        model.classes.push(ClassEntry { name, methods });
    }

    model
}

fn method_signature<M: MethodDecl>(method: &M) -> MethodSignature {
    let params = method.parameters();
    let return_type = method.return_type();
    MethodSignature::new(
        &method.name(),
        params.iter().map(|p| (p.name.as_str(), p.type_text())),
        &return_type,
    )
}
