//! Project descriptor (tsconfig.json) loading and file discovery

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::Deserialize;
use thiserror::Error;

/// Extensions that are always part of a project.
const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Extensions added by `compilerOptions.allowJs`.
const JS_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];

/// Directories never descended into when matching wildcards.
const SKIPPED_DIRS: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("cannot read project descriptor {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid project descriptor {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid pattern {pattern:?} in {path}: {source}")]
    Pattern {
        path: PathBuf,
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CompilerOptions {
    allow_js: bool,
    out_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Descriptor {
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    compiler_options: CompilerOptions,
}

/// The set of source files selected by a project descriptor.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory containing the descriptor; patterns are relative to it.
    pub root: PathBuf,
    pub descriptor: PathBuf,
    pub allow_js: bool,
    /// Files in analysis order: explicit `files` first, then `include`
    /// matches sorted by path.
    pub files: Vec<PathBuf>,
}

impl Project {
    pub fn load(descriptor: &Path) -> Result<Self, ProjectError> {
        let raw = std::fs::read_to_string(descriptor).map_err(|source| ProjectError::Read {
            path: descriptor.to_path_buf(),
            source,
        })?;
        let parsed: Descriptor =
            serde_json::from_str(&strip_jsonc(&raw)).map_err(|source| ProjectError::Parse {
                path: descriptor.to_path_buf(),
                source,
            })?;

        let root = descriptor
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let allow_js = parsed.compiler_options.allow_js;
        let files = discover(&root, descriptor, &parsed)?;

        tracing::debug!(
            "Project {} selects {} files (allowJs: {})",
            descriptor.display(),
            files.len(),
            allow_js
        );

        Ok(Project {
            root,
            descriptor: descriptor.to_path_buf(),
            allow_js,
            files,
        })
    }
}

fn discover(
    root: &Path,
    descriptor: &Path,
    parsed: &Descriptor,
) -> Result<Vec<PathBuf>, ProjectError> {
    let allow_js = parsed.compiler_options.allow_js;
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    // Explicit files are kept even if missing, so the read failure surfaces later.
    for file in parsed.files.iter().flatten() {
        let path = root.join(file);
        if !is_dot_path(Path::new(file)) && seen.insert(path.clone()) {
            files.push(path);
        }
    }

    let include = match (&parsed.include, &parsed.files) {
        (Some(include), _) => include.clone(),
        (None, Some(_)) => Vec::new(),
        (None, None) => vec!["**/*".to_string()],
    };
    if include.is_empty() {
        return Ok(files);
    }

    let mut exclude = parsed.exclude.clone().unwrap_or_else(|| {
        SKIPPED_DIRS.iter().map(|d| d.to_string()).collect()
    });
    if parsed.exclude.is_none() {
        if let Some(out_dir) = &parsed.compiler_options.out_dir {
            exclude.push(out_dir.clone());
        }
    }

    let include_set = build_globset(descriptor, &include, allow_js)?;
    let exclude_set = build_globset(descriptor, &exclude, allow_js)?;

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && SKIPPED_DIRS.contains(&name.as_ref()))
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Cannot read entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if is_dot_path(relative) || !has_source_extension(relative, allow_js) {
            continue;
        }
        if include_set.is_match(relative) && !exclude_set.is_match(relative) {
            let path = path.to_path_buf();
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Turn tsconfig-style patterns into a glob set. A pattern whose last
/// segment has no wildcard and no source extension names a directory and
/// matches everything below it.
fn build_globset(
    descriptor: &Path,
    patterns: &[String],
    allow_js: bool,
) -> Result<GlobSet, ProjectError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let trimmed = pattern.trim_start_matches("./").trim_end_matches('/');
        let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
        let names_file =
            last.contains(['*', '?']) || has_source_extension(Path::new(last), allow_js);
        let expanded = if names_file {
            trimmed.to_string()
        } else {
            format!("{}/**/*", trimmed)
        };

        let glob: Glob = GlobBuilder::new(&expanded)
            .literal_separator(true)
            .build()
            .map_err(|source| ProjectError::Pattern {
                path: descriptor.to_path_buf(),
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ProjectError::Pattern {
        path: descriptor.to_path_buf(),
        pattern: patterns.join(", "),
        source,
    })
}

fn has_source_extension(path: &Path, allow_js: bool) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => TS_EXTENSIONS.contains(&ext) || (allow_js && JS_EXTENSIONS.contains(&ext)),
        None => false,
    }
}

/// Whether any segment of `path` begins with a dot.
pub fn is_dot_path(path: &Path) -> bool {
    path.components().any(|c| match c {
        std::path::Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Remove `//` and `/* */` comments and trailing commas from JSON text, as
/// tsconfig files allow both.
pub fn strip_jsonc(input: &str) -> String {
    let mut without_comments = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            without_comments.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        without_comments.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                without_comments.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        without_comments.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                without_comments.push(' ');
            }
            _ => without_comments.push(c),
        }
    }

    // Second pass: drop commas that are followed only by whitespace and a
    // closing bracket.
    let mut output = String::with_capacity(without_comments.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = without_comments.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            output.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        output.push(c);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relative(project: &Project) -> Vec<String> {
        project
            .files
            .iter()
            .map(|p| p.strip_prefix(&project.root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_strip_jsonc() {
        let input = r#"{
  // line comment
  "include": ["src/**/*", /* inline */ "lib"],
  "url": "http://example.com/*not a comment*/",
  "compilerOptions": { "allowJs": true, },
}"#;
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc(input)).unwrap();
        assert_eq!(value["include"][1], "lib");
        assert_eq!(value["url"], "http://example.com/*not a comment*/");
        assert_eq!(value["compilerOptions"]["allowJs"], true);
    }

    #[test]
    fn test_default_include() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "tsconfig.json", "{}");
        write(root, "src/b.ts", "");
        write(root, "src/a.ts", "");
        write(root, "src/util/c.tsx", "");
        write(root, "src/legacy.js", "");
        write(root, "node_modules/dep/index.d.ts", "");
        write(root, ".cache/hidden.ts", "");
        write(root, "src/.secret.ts", "");
        write(root, "README.md", "");

        let project = Project::load(&root.join("tsconfig.json")).unwrap();
        assert!(!project.allow_js);
        assert_eq!(relative(&project), ["src/a.ts", "src/b.ts", "src/util/c.tsx"]);
    }

    #[test]
    fn test_include_exclude_and_allow_js() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "tsconfig.json",
            r#"{
  "compilerOptions": { "allowJs": true, "outDir": "dist" },
  "include": ["src"],
  "exclude": ["src/generated"]
}"#,
        );
        write(root, "src/app.ts", "");
        write(root, "src/legacy.js", "");
        write(root, "src/generated/api.ts", "");
        write(root, "scripts/tool.ts", "");

        let project = Project::load(&root.join("tsconfig.json")).unwrap();
        assert!(project.allow_js);
        assert_eq!(relative(&project), ["src/app.ts", "src/legacy.js"]);
    }

    #[test]
    fn test_files_list_first() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "tsconfig.json",
            r#"{ "files": ["main.ts", "missing.ts"], "include": ["lib/*.ts"] }"#,
        );
        write(root, "main.ts", "");
        write(root, "lib/a.ts", "");
        write(root, "lib/deep/b.ts", "");

        let project = Project::load(&root.join("tsconfig.json")).unwrap();
        assert_eq!(relative(&project), ["main.ts", "missing.ts", "lib/a.ts"]);
    }

    #[test]
    fn test_out_dir_excluded_by_default() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "tsconfig.json", r#"{ "compilerOptions": { "outDir": "build" } }"#);
        write(root, "index.ts", "");
        write(root, "build/index.d.ts", "");

        let project = Project::load(&root.join("tsconfig.json")).unwrap();
        assert_eq!(relative(&project), ["index.ts"]);
    }

    #[test]
    fn test_missing_descriptor() {
        let dir = TempDir::new().unwrap();
        let err = Project::load(&dir.path().join("tsconfig.json")).unwrap_err();
        assert!(matches!(err, ProjectError::Read { .. }));
    }

    #[test]
    fn test_malformed_descriptor() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tsconfig.json", "{ \"include\": [ ");
        let err = Project::load(&dir.path().join("tsconfig.json")).unwrap_err();
        assert!(matches!(err, ProjectError::Parse { .. }));
    }

    #[test]
    fn test_dot_paths() {
        assert!(is_dot_path(Path::new(".git/config")));
        assert!(is_dot_path(Path::new("src/.hidden/a.ts")));
        assert!(!is_dot_path(Path::new("src/a.ts")));
    }
}
