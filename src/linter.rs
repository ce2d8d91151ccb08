//! Definition linting - static analysis of schema definition files.
//!
//! Reports:
//! - files that are not valid JSON or not valid definitions
//! - contexts setting both `$include` and `$exclude`
//! - context operators naming undeclared properties
//! - contexts without any operator
//! - contexts named `default`
//!
//! Definitions nested in `entity` and `collection` factories are checked
//! like top-level ones.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::loader::{load_json, parse_definition, pointer};
use crate::types::{ContextDefinition, SchemaDefinition, CONTEXTS_KEY, DEFAULT_CONTEXT, METHODS_KEY};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding in a definition file.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON pointer to the offending context or operator, e.g.
    /// `/address/factory/entity/$contexts/create/$skip`.
    pub path: String,
    pub message: String,
}

/// Outcome for one definition file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    /// Contexts checked, nested definitions included.
    pub contexts: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Aggregate over every definition file under a path.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub contexts_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// True when no file produced an error.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    /// True when the run should exit successfully; `strict` also fails on
    /// warnings.
    pub fn passes(&self, strict: bool) -> bool {
        self.is_ok() && (!strict || self.warnings == 0)
    }
}

/// Lint a definition file, or every `.json` definition below a directory.
///
/// With `strict`, files with warnings count as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let results: Vec<FileResult> = collect_definition_files(path)
        .iter()
        .map(|file| lint_file(file, path))
        .collect();

    let failed = results
        .iter()
        .filter(|r| match r.status {
            FileStatus::Ok => false,
            FileStatus::Warning => strict,
            FileStatus::Error => true,
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: results.len(),
        contexts_checked: results.iter().map(|r| r.contexts).sum(),
        passed: results.len() - failed,
        failed,
        errors: results.iter().map(|r| count(r, Severity::Error)).sum(),
        warnings: results.iter().map(|r| count(r, Severity::Warning)).sum(),
        results,
    }
}

/// Lint a single definition file; `base_path` is stripped from the
/// reported file name.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();

    let loaded = load_json(file).and_then(|document| {
        let definition = parse_definition(&document)?;
        Ok((document, definition))
    });
    let (document, definition) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            return FileResult {
                file: display,
                status: FileStatus::Error,
                contexts: 0,
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    code: "E001".to_string(),
                    file: file.to_path_buf(),
                    path: "/".to_string(),
                    message: format!("not a loadable schema definition: {}", e),
                }],
            };
        }
    };

    let mut diagnostics = Vec::new();
    let contexts = check_definition_at(&definition, &document, "", file, &mut diagnostics);

    let status = if diagnostics.is_empty() {
        FileStatus::Ok
    } else if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        FileStatus::Error
    } else {
        FileStatus::Warning
    };

    FileResult {
        file: display,
        status,
        contexts,
        diagnostics,
    }
}

/// Check the contexts of a parsed definition and of every definition nested
/// in its `entity` and `collection` factories.
///
/// `document` is the JSON the definition was parsed from.
pub fn check_definition(
    definition: &SchemaDefinition,
    document: &Value,
    file: &Path,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_definition_at(definition, document, "", file, &mut diagnostics);
    diagnostics
}

/// Returns the number of contexts checked.
fn check_definition_at(
    definition: &SchemaDefinition,
    document: &Value,
    path: &str,
    file: &Path,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let contexts_path = pointer(path, CONTEXTS_KEY);
    for (name, context) in &definition.contexts {
        let context_path = pointer(&contexts_path, name);
        check_context(definition, name, context, file, &context_path, diagnostics);
    }

    let mut checked = definition.contexts.len();
    for (nested_path, nested_document) in nested_definitions(document, path) {
        // Already validated as part of the enclosing document.
        if let Ok(nested) = parse_definition(nested_document) {
            checked += check_definition_at(&nested, nested_document, &nested_path, file, diagnostics);
        }
    }
    checked
}

/// Raw definitions held by `{"entity": ...}` and `{"collection": ...}`
/// factories, with their JSON pointers.
fn nested_definitions<'a>(document: &'a Value, path: &str) -> Vec<(String, &'a Value)> {
    let Some(properties) = document.as_object() else {
        return Vec::new();
    };

    properties
        .iter()
        .filter(|(key, _)| key.as_str() != CONTEXTS_KEY && key.as_str() != METHODS_KEY)
        .filter_map(|(key, property)| {
            let factory = property.get("factory")?.as_object()?;
            let (kind, nested) = factory.iter().next()?;
            if kind != "entity" && kind != "collection" {
                return None;
            }
            let factory_path = pointer(&pointer(path, key), "factory");
            Some((pointer(&factory_path, kind), nested))
        })
        .collect()
}

fn check_context(
    definition: &SchemaDefinition,
    name: &str,
    context: &ContextDefinition,
    file: &Path,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut warn = |code: &str, path: String, message: String| {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: code.to_string(),
            file: file.to_path_buf(),
            path,
            message,
        });
    };

    if name == DEFAULT_CONTEXT {
        warn(
            "W004",
            path.to_string(),
            "context \"default\" is reserved and ignored".to_string(),
        );
        return;
    }

    if !context.include.is_empty() && !context.exclude.is_empty() {
        warn(
            "W001",
            path.to_string(),
            format!("context \"{}\" sets both $include and $exclude; $include takes precedence", name),
        );
    }

    let operators: [(&str, Vec<&String>); 4] = [
        ("$include", context.include.iter().collect()),
        ("$exclude", context.exclude.iter().collect()),
        ("$modify", context.modify.keys().collect()),
        ("$skip", context.skip.iter().collect()),
    ];

    for (operator, names) in &operators {
        for property in names {
            if !definition.properties.contains_key(*property) {
                warn(
                    "W002",
                    pointer(path, operator),
                    format!("{} names undeclared property \"{}\"", operator, property),
                );
            }
        }
    }

    if operators.iter().all(|(_, names)| names.is_empty()) {
        warn(
            "W003",
            path.to_string(),
            format!("context \"{}\" has no operators and equals the default schema", name),
        );
    }
}

fn count(result: &FileResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

fn is_definition_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

/// `.json` files under `path` in sorted order, or `path` itself when it is
/// a definition file.
fn collect_definition_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return if is_definition_file(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut files = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.is_dir() {
                pending.push(entry_path);
            } else if is_definition_file(&entry_path) {
                files.push(entry_path);
            }
        }
    }
    files.sort();
    files
}
