//! Offline view of what the next sync would touch.

use serde::Serialize;
use std::collections::HashSet;

use super::SourceDocument;
use crate::error::SyncError;
use crate::state::SyncStateManager;
use crate::task::{generate_content_hash, parse_tasks, TaskStatus};

/// One task as seen against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub key: String,
    pub title: String,
    pub status: TaskStatus,
    /// `path:line`
    pub location: String,
    pub issue_number: Option<u64>,
    pub needs_sync: bool,
}

/// Ledger comparison for every discovered task. Makes no tracker calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub entries: Vec<StatusEntry>,
    /// Keys that appear more than once; only the first occurrence is listed
    pub duplicates: Vec<String>,
    pub orphans: Vec<String>,
}

impl SyncStatus {
    /// Entries the next sync would push.
    pub fn pending(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter().filter(|e| e.needs_sync)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Check if the next sync would do nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.pending_count() == 0 && self.orphans.is_empty() && self.duplicates.is_empty()
    }
}

/// Compare the tasks in `documents` with a loaded ledger.
///
/// # Errors
///
/// Returns [`SyncError::State`] if the ledger is not loaded.
pub fn compute_status(
    documents: &[SourceDocument],
    state: &SyncStateManager,
) -> Result<SyncStatus, SyncError> {
    let mut status = SyncStatus::default();
    let mut seen = HashSet::new();

    for document in documents {
        for task in parse_tasks(&document.content, &document.relative_path) {
            let key = task.ledger_key();
            if !seen.insert(key.clone()) {
                status.duplicates.push(key);
                continue;
            }

            let hash = generate_content_hash(&task);
            status.entries.push(StatusEntry {
                issue_number: state.get(&key)?.map(|r| r.tracker_issue_number),
                needs_sync: state.needs_sync(&task, &hash)?,
                location: task.source_location(),
                title: task.title,
                status: task.status,
                key,
            });
        }
    }

    status.orphans = state.find_orphans(&seen)?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateError;

    fn loaded() -> (tempfile::TempDir, SyncStateManager) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut state = SyncStateManager::new(dir.path().join("state.json"));
        state.load().unwrap();
        (dir, state)
    }

    #[test]
    fn test_status_against_ledger() {
        let (_dir, mut state) = loaded();
        let doc = SourceDocument::new("specs/core/tasks.md", "- [ ] 1 A\n- [x] 2 B\n");
        let synced = parse_tasks(&doc.content, &doc.relative_path).remove(0);
        state
            .update("core/1", 5, &generate_content_hash(&synced), &synced.file_path)
            .unwrap();
        state.update("old/9", 6, "h", "specs/old/tasks.md").unwrap();

        let status = compute_status(&[doc], &state).unwrap();
        assert_eq!(status.entries.len(), 2);
        assert!(!status.entries[0].needs_sync);
        assert_eq!(status.entries[0].issue_number, Some(5));
        assert!(status.entries[1].needs_sync);
        assert_eq!(status.pending_count(), 1);
        assert_eq!(status.orphans, vec!["old/9".to_string()]);
        assert!(!status.is_clean());
    }

    #[test]
    fn test_duplicates_listed() {
        let (_dir, state) = loaded();
        let docs = [
            SourceDocument::new("a/core/tasks.md", "- [ ] 1 A"),
            SourceDocument::new("b/core/tasks.md", "- [ ] 1 B"),
        ];
        let status = compute_status(&docs, &state).unwrap();
        assert_eq!(status.duplicates, vec!["core/1".to_string()]);
        assert_eq!(status.entries.len(), 1);
    }

    #[test]
    fn test_requires_loaded_ledger() {
        let state = SyncStateManager::new("/nonexistent/state.json");
        let err = compute_status(&[], &state).unwrap_err();
        assert!(matches!(err, SyncError::State(StateError::NotLoaded)));
    }

    #[test]
    fn test_json_shape() {
        let (_dir, state) = loaded();
        let status =
            compute_status(&[SourceDocument::new("core/tasks.md", "- [-] 3 C")], &state).unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["entries"][0]["needsSync"], true);
        assert_eq!(json["entries"][0]["status"], "in_progress");
        assert!(json["entries"][0]["issueNumber"].is_null());
    }
}
