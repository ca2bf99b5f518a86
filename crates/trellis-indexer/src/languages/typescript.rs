//! TypeScript syntax adapter and extractor using tree-sitter
//!
//! The adapter types also cover the JavaScript grammar, which shares node
//! kinds with TypeScript apart from type annotations and class heritage.

use std::collections::HashSet;
use std::path::Path;

use tree_sitter::Node;
use trellis_core::{StructuralModel, display_name};

use crate::extractor::{ExtractError, LanguageExtractor, build_model};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};
use crate::syntax::{ClassDecl, IMPLICIT_TYPE, MethodDecl, Parameter};

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

const METHOD_KINDS: &[&str] = &[
    "method_definition",
    "method_signature",
    "abstract_method_signature",
];

/// Nodes that open a new function scope; `return` inside them does not
/// belong to the enclosing method.
const SCOPE_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "function",
    "arrow_function",
    "generator_function",
    "generator_function_declaration",
    "method_definition",
    "class",
    "class_declaration",
    "abstract_class_declaration",
];

fn text(node: Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or_default().to_string()
}

fn has_token(node: Node, tokens: &[&str]) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && tokens.contains(&child.kind()));
    found
}

fn named_children_of<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Text of a `: T` annotation without the colon.
fn annotation_text(annotation: Node, source: &[u8]) -> String {
    match named_children_of(annotation).first() {
        Some(ty) => text(*ty, source),
        None => text(annotation, source).trim_start_matches(':').trim().to_string(),
    }
}

/// Whether a function body returns a value from its own scope.
fn returns_value(body: Node) -> bool {
    let mut stack = named_children_of(body);
    while let Some(node) = stack.pop() {
        match node.kind() {
            "return_statement" => {
                if !named_children_of(node).is_empty() {
                    return true;
                }
            }
            kind if SCOPE_KINDS.contains(&kind) => {}
            _ => stack.extend(named_children_of(node)),
        }
    }
    false
}

/// First error or missing node in the tree, if any.
///
/// The walks below keep an explicit stack; generated code can nest far
/// deeper than the thread stack allows.
pub(crate) fn first_error<'tree>(root: Node<'tree>) -> Option<Node<'tree>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Class-like declarations under `root`, in document order (parents
/// before the classes nested inside them).
pub(crate) fn collect_classes<'tree>(
    root: Node<'tree>,
    source: &'tree [u8],
    out: &mut Vec<SyntaxClass<'tree>>,
) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if CLASS_KINDS.contains(&node.kind()) {
            out.push(SyntaxClass { node, source });
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// Parse `content` with the pool and build its structural model.
pub(crate) fn extract_with(
    pool: &ParserPool,
    file_type: FileType,
    path: &Path,
    content: &[u8],
) -> Result<StructuralModel, ExtractError> {
    let source = std::str::from_utf8(content)?;

    let parsed = pool
        .parse_blocking(ParseRequest {
            file_type,
            content: source.to_string(),
            path: path.to_path_buf(),
        })
        .map_err(|e| ExtractError::Parser(e.to_string()))?;

    let root = parsed.tree.root_node();
    if let Some(error) = first_error(root) {
        let pos = error.start_position();
        return Err(ExtractError::Syntax {
            line: pos.row + 1,
            column: pos.column + 1,
        });
    }

    let mut classes = Vec::new();
    collect_classes(root, parsed.content.as_bytes(), &mut classes);
    Ok(build_model(classes))
}

/// A class declaration, abstract class declaration or class expression.
pub struct SyntaxClass<'tree> {
    node: Node<'tree>,
    source: &'tree [u8],
}

impl<'tree> ClassDecl for SyntaxClass<'tree> {
    type Method = SyntaxMethod<'tree>;

    fn name(&self) -> Option<String> {
        self.node
            .child_by_field_name("name")
            .map(|n| text(n, self.source))
    }

    fn methods(&self) -> Vec<SyntaxMethod<'tree>> {
        let Some(body) = self.node.child_by_field_name("body") else {
            return Vec::new();
        };
        let members: Vec<SyntaxMethod<'tree>> = named_children_of(body)
            .into_iter()
            .filter(|member| METHOD_KINDS.contains(&member.kind()))
            .map(|node| SyntaxMethod { node, source: self.source })
            .filter(|method| !method.is_constructor() && !method.is_accessor())
            .collect();

        // Overload signatures are listed once, through their implementation.
        let implemented: HashSet<String> = members
            .iter()
            .filter(|method| method.node.kind() == "method_definition")
            .map(|method| method.name())
            .collect();
        members
            .into_iter()
            .filter(|method| {
                method.node.kind() != "method_signature" || !implemented.contains(&method.name())
            })
            .collect()
    }

    fn base_name(&self) -> Option<String> {
        let heritage = named_children_of(self.node)
            .into_iter()
            .find(|child| child.kind() == "class_heritage")?;
        let first = *named_children_of(heritage).first()?;

        let mut base = match first.kind() {
            "extends_clause" => first.child_by_field_name("value")?,
            "implements_clause" => return None,
            // JavaScript: `extends <expression>` directly
            _ => first,
        };
        // `Base<T>` may come back as an instantiation expression
        if base.kind() == "instantiation_expression" {
            base = *named_children_of(base).first()?;
        }

        if base.kind() == "class" {
            let name = base.child_by_field_name("name").map(|n| text(n, self.source));
            Some(display_name(name.as_deref()))
        } else {
            Some(text(base, self.source))
        }
    }
}

/// A method definition or signature inside a class body.
pub struct SyntaxMethod<'tree> {
    node: Node<'tree>,
    source: &'tree [u8],
}

impl SyntaxMethod<'_> {
    fn is_constructor(&self) -> bool {
        self.name() == "constructor"
    }

    fn is_accessor(&self) -> bool {
        has_token(self.node, &["get", "set", "static get"])
    }

    fn is_async(&self) -> bool {
        has_token(self.node, &["async"])
    }

    fn parameter(&self, node: Node) -> Parameter {
        match node.kind() {
            "required_parameter" | "optional_parameter" => Parameter {
                name: node
                    .child_by_field_name("pattern")
                    .map(|p| text(p, self.source))
                    .unwrap_or_else(|| text(node, self.source)),
                type_annotation: node
                    .child_by_field_name("type")
                    .map(|t| annotation_text(t, self.source)),
            },
            "assignment_pattern" => Parameter {
                name: node
                    .child_by_field_name("left")
                    .map(|p| text(p, self.source))
                    .unwrap_or_else(|| text(node, self.source)),
                type_annotation: None,
            },
            _ => Parameter {
                name: text(node, self.source),
                type_annotation: None,
            },
        }
    }
}

impl MethodDecl for SyntaxMethod<'_> {
    fn name(&self) -> String {
        self.node
            .child_by_field_name("name")
            .map(|n| text(n, self.source))
            .unwrap_or_default()
    }

    fn parameters(&self) -> Vec<Parameter> {
        match self.node.child_by_field_name("parameters") {
            Some(params) => named_children_of(params)
                .into_iter()
                .map(|p| self.parameter(p))
                .collect(),
            None => Vec::new(),
        }
    }

    fn return_type(&self) -> String {
        if let Some(annotation) = self.node.child_by_field_name("return_type") {
            return annotation_text(annotation, self.source);
        }

        let inferred = match self.node.child_by_field_name("body") {
            Some(body) if returns_value(body) => IMPLICIT_TYPE,
            Some(_) => "void",
            // Signatures without a body are implicitly `any`
            None => return IMPLICIT_TYPE.to_string(),
        };

        if self.is_async() {
            format!("Promise<{}>", inferred)
        } else {
            inferred.to_string()
        }
    }
}

pub struct TypeScriptExtractor {
    parser_pool: ParserPool,
    file_type: FileType,
}

impl TypeScriptExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool, file_type: FileType::TypeScript }
    }

    pub fn tsx(parser_pool: ParserPool) -> Self {
        Self { parser_pool, file_type: FileType::Tsx }
    }
}

impl LanguageExtractor for TypeScriptExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<StructuralModel, ExtractError> {
        extract_with(&self.parser_pool, self.file_type, path, content)
    }
}
