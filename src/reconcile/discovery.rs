//! Finding spec documents on disk.

use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SyncError};

/// A checklist document read from the specs tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Absolute or caller-relative path on disk
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated
    pub relative_path: String,
    pub content: String,
}

impl SourceDocument {
    /// Document with in-memory content, mostly for tests.
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        Self {
            path: PathBuf::from(&relative_path),
            relative_path,
            content: content.into(),
        }
    }
}

/// `/`-separated form of `path` relative to `root`.
fn relative_to(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_matcher(task_file: &str) -> Result<GlobMatcher> {
    Glob::new(task_file)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| SyncError::invalid_config("taskFile", e.to_string()))
}

/// Find every document named like `task_file` under `specs_dir`.
///
/// `task_file` is matched against file names and may be a glob
/// (`tasks.md`, `*.tasks.md`). Hidden directories below `specs_dir` are
/// skipped. Documents are returned sorted by relative path.
///
/// # Errors
///
/// Returns [`SyncError::Discovery`] if `specs_dir` is missing or any entry
/// cannot be read. A partial listing is never returned, since it would make
/// unseen tasks look orphaned.
pub fn discover_documents(
    project_dir: &Path,
    specs_dir: &Path,
    task_file: &str,
) -> Result<Vec<SourceDocument>> {
    if !specs_dir.is_dir() {
        return Err(SyncError::discovery(
            specs_dir,
            "specs directory does not exist",
        ));
    }

    let matcher = file_matcher(task_file)?;
    let mut documents = Vec::new();

    let walker = WalkDir::new(specs_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !e.file_name().to_string_lossy().starts_with('.')
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(specs_dir).to_path_buf();
            SyncError::discovery(path, e.to_string())
        })?;
        if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }

        let path = entry.into_path();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SyncError::discovery(&path, e.to_string()))?;
        documents.push(SourceDocument {
            relative_path: relative_to(project_dir, &path),
            path,
            content,
        });
    }

    documents.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!(
        "Discovered {} document(s) under {}",
        documents.len(),
        specs_dir.display()
    );
    Ok(documents)
}
