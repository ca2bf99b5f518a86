//! Narrow view of class-like declarations used by the extractor
//!
//! Syntax adapters (see `languages`) implement these traits over a concrete
//! parse tree. Model building in [`crate::extractor`] only sees this surface,
//! so the parsing engine can change without touching it.

/// A parameter as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    /// Type annotation text, if any.
    pub type_annotation: Option<String>,
}

/// Type used for parameters without an annotation.
pub const IMPLICIT_TYPE: &str = "any";

impl Parameter {
    pub fn type_text(&self) -> &str {
        self.type_annotation.as_deref().unwrap_or(IMPLICIT_TYPE)
    }
}

/// A method member of a class-like declaration.
pub trait MethodDecl {
    fn name(&self) -> String;
    fn parameters(&self) -> Vec<Parameter>;
    /// Declared return type, or a syntactic best guess when unannotated.
    fn return_type(&self) -> String;
}

/// A class-like declaration (named or anonymous).
pub trait ClassDecl {
    type Method: MethodDecl;

    /// `None` for anonymous declarations.
    fn name(&self) -> Option<String>;
    /// Methods in declaration order. Constructors and accessors are excluded.
    fn methods(&self) -> Vec<Self::Method>;
    /// Display name of the (first) base class, if the declaration extends one.
    fn base_name(&self) -> Option<String>;
}
