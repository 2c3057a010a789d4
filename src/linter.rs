//! Manifest linting - static analysis of declaration manifests.
//!
//! Checks manifest files for:
//! - JSON/YAML syntax and type expression errors
//! - Fatal resolution errors (name collisions, cycles, discriminator keys)
//! - Annotation problems reported as warnings during resolution
//! - Generated documents that would fail validation

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::document::Document;
use crate::error::DocumentError;
use crate::loader::load_source;
use crate::resolver::resolve_all;
use crate::types::{Diagnostic, ResolveOptions, Severity};

/// Declaration reported for problems that concern the whole manifest.
const MANIFEST: &str = "<manifest>";

/// Result of linting a single manifest.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of manifests.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a manifest or a directory of manifests.
///
/// If path is a directory, recursively finds all `.json`, `.yaml` and `.yml`
/// files. If `strict` is true, warnings are treated as errors.
pub fn lint(path: &Path, options: &ResolveOptions, strict: bool) -> LintResult {
    let files = collect_manifest_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path, options);
        total_errors += count(&file_result, Severity::Error);
        total_warnings += count(&file_result, Severity::Warning);
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

fn count(result: &FileResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

/// Lint a single manifest file.
pub fn lint_file(file: &Path, base_path: &Path, options: &ResolveOptions) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();
    let display = if display.as_os_str().is_empty() {
        file.to_path_buf()
    } else {
        display
    };

    let source = match load_source(file) {
        Ok(source) => source,
        Err(e) => {
            return FileResult {
                file: display,
                status: FileStatus::Error,
                diagnostics: vec![error("E001", MANIFEST, format!("cannot load manifest: {e}"))],
            };
        }
    };

    let mut diagnostics = Vec::new();
    match resolve_all(&source, options) {
        Ok(resolution) => {
            diagnostics.extend(resolution.diagnostics);

            let mut document = Document::new("lint", "0");
            let checked = document
                .add_schemas(&resolution.schemas)
                .and_then(|_| document.validate());
            match checked {
                Ok(()) => {}
                Err(DocumentError::Invalid { errors }) => {
                    diagnostics.extend(
                        errors
                            .into_iter()
                            .map(|e| error("E003", &e.path, e.message)),
                    );
                }
                Err(e) => diagnostics.push(error("E003", MANIFEST, e.to_string())),
            }
        }
        Err(e) => diagnostics.push(error("E002", e.declaration(), e.to_string())),
    }

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: display,
        status,
        diagnostics,
    }
}

fn error(code: &str, declaration: &str, message: String) -> Diagnostic {
    Diagnostic {
        severity: Severity::Error,
        code: code.to_string(),
        declaration: declaration.to_string(),
        field: None,
        message,
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e, "json" | "yaml" | "yml"))
        .unwrap_or(false)
}

/// Collect all manifest files in a path (file or directory).
fn collect_manifest_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_manifest(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_manifest(&path) {
            files.push(path);
        }
    }
}
