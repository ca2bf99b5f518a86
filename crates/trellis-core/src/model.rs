//! Core data structures for the structural model

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Display name used for class declarations that carry no name.
pub const UNNAMED_CLASS: &str = "UnnamedClass";

/// A rendered method signature: `name(p1: t1, p2: t2): returnType`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodSignature(String);

impl MethodSignature {
    /// Render a signature from its parts. Types are taken as written.
    pub fn new<'a, P>(name: &str, params: P, return_type: &str) -> Self
    where
        P: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let params = params
            .into_iter()
            .map(|(param, ty)| format!("{}: {}", param, ty))
            .collect::<Vec<_>>()
            .join(", ");
        MethodSignature(format!("{}({}): {}", name, params, return_type))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MethodSignature {
    fn from(s: &str) -> Self {
        MethodSignature(s.to_string())
    }
}

/// One class-like declaration and its methods, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub name: String,
    pub methods: Vec<MethodSignature>,
}

impl ClassEntry {
    /// Create an entry, falling back to [`UNNAMED_CLASS`] when `name` is absent.
    pub fn new(name: Option<&str>, methods: Vec<MethodSignature>) -> Self {
        ClassEntry {
            name: display_name(name),
            methods,
        }
    }
}

/// Directed inheritance edge: `from` extends `to`.
///
/// `to` may name a class that is not part of the model (external or
/// unresolved bases are kept as written).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
}

/// Classes and relationships in encounter order. Never sorted or deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralModel {
    pub classes: Vec<ClassEntry>,
    pub relationships: Vec<Relationship>,
}

impl StructuralModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another model's contents after this one's.
    pub fn extend(&mut self, other: StructuralModel) {
        self.classes.extend(other.classes);
        self.relationships.extend(other.relationships);
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.relationships.is_empty()
    }
}

/// A single file that could not be read or parsed during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Output of one extraction pass: whatever could be extracted, plus the
/// files that contributed nothing because they failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub model: StructuralModel,
    pub failures: Vec<FileFailure>,
}

impl Extraction {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Resolve a declaration's display name.
pub fn display_name(name: Option<&str>) -> String {
    match name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => UNNAMED_CLASS.to_string(),
    }
}
