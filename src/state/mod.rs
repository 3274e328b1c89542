//! Synchronization ledger.
//!
//! The ledger remembers, for every task that was ever pushed to the
//! tracker, which issue it maps to and the fingerprint of the content last
//! pushed. It lives in a single JSON file (an array of [`SyncRecord`]) and
//! is the only state carried between runs.
//!
//! ```text
//! SyncStateManager
//!   ├── path: PathBuf
//!   └── records: Option<BTreeMap<key, SyncRecord>>   (None until load())
//! ```
//!
//! Every accessor except [`SyncStateManager::load`] fails with
//! [`StateError::NotLoaded`] until the ledger has been loaded.

mod persistence;
mod transfer;

pub use transfer::{StateEnvelope, STATE_FORMAT_VERSION};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::task::Task;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the sync ledger.
#[derive(Error, Debug)]
pub enum StateError {
    /// An accessor was used before `load()`
    #[error("Sync state not loaded: call load() before accessing the ledger")]
    NotLoaded,

    /// Reading or writing the ledger file failed
    #[error("Sync state I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The ledger file does not contain a valid record array
    #[error("Malformed sync state in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The ledger file lists the same task key twice
    #[error("Sync state in {path} has more than one record for '{key}'")]
    DuplicateKey { path: PathBuf, key: String },

    /// An import payload failed structural validation
    #[error("Invalid state import: {reason}")]
    InvalidImport { reason: String },
}

impl StateError {
    /// Create an import validation error.
    pub fn invalid_import(reason: impl Into<String>) -> Self {
        Self::InvalidImport {
            reason: reason.into(),
        }
    }
}

/// Result alias for ledger operations.
pub type StateResult<T> = std::result::Result<T, StateError>;

// ============================================================================
// Sync Record
// ============================================================================

/// Ledger entry linking a task to its tracker issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// Ledger key of the task (`spec_group/id`)
    pub task_id: String,
    /// Issue number on the tracker
    pub tracker_issue_number: u64,
    /// When the last successful mutation happened
    pub last_synced_at: DateTime<Utc>,
    /// Content hash pushed by the last successful mutation
    pub last_content_hash: String,
    /// Document path the task lived in at that time
    pub file_path: String,
}

impl SyncRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        task_id: impl Into<String>,
        tracker_issue_number: u64,
        last_content_hash: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            tracker_issue_number,
            last_synced_at: Utc::now(),
            last_content_hash: last_content_hash.into(),
            file_path: file_path.into(),
        }
    }
}

// ============================================================================
// Sync State Manager
// ============================================================================

/// File-backed store of [`SyncRecord`]s keyed by task key.
#[derive(Debug)]
pub struct SyncStateManager {
    path: PathBuf,
    records: Option<BTreeMap<String, SyncRecord>>,
}

impl SyncStateManager {
    /// Create a manager for the ledger at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: None,
        }
    }

    /// Default ledger location, colocated with the spec documents.
    #[must_use]
    pub fn default_path(specs_dir: &Path) -> PathBuf {
        specs_dir.join(".sync-state.json")
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if `load()` has completed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    fn records(&self) -> StateResult<&BTreeMap<String, SyncRecord>> {
        self.records.as_ref().ok_or(StateError::NotLoaded)
    }

    fn records_mut(&mut self) -> StateResult<&mut BTreeMap<String, SyncRecord>> {
        self.records.as_mut().ok_or(StateError::NotLoaded)
    }

    /// Look up the record for a task key.
    pub fn get(&self, key: &str) -> StateResult<Option<&SyncRecord>> {
        Ok(self.records()?.get(key))
    }

    /// Insert or replace the record for a task key.
    ///
    /// The stored record's `task_id` is forced to `key`.
    pub fn set(&mut self, key: &str, mut record: SyncRecord) -> StateResult<()> {
        record.task_id = key.to_string();
        self.records_mut()?.insert(key.to_string(), record);
        Ok(())
    }

    /// Remove a record. Returns whether one existed.
    pub fn remove(&mut self, key: &str) -> StateResult<bool> {
        Ok(self.records_mut()?.remove(key).is_some())
    }

    /// Record a successful mutation for a task key, stamped with the current time.
    pub fn update(
        &mut self,
        key: &str,
        issue_number: u64,
        content_hash: &str,
        file_path: &str,
    ) -> StateResult<()> {
        self.set(key, SyncRecord::new(key, issue_number, content_hash, file_path))
    }

    /// All records, ordered by key.
    pub fn all(&self) -> StateResult<Vec<&SyncRecord>> {
        Ok(self.records()?.values().collect())
    }

    /// Records whose task last lived in `file_path`.
    pub fn for_file(&self, file_path: &str) -> StateResult<Vec<&SyncRecord>> {
        Ok(self
            .records()?
            .values()
            .filter(|record| record.file_path == file_path)
            .collect())
    }

    /// Number of records.
    pub fn len(&self) -> StateResult<usize> {
        Ok(self.records()?.len())
    }

    /// Check if the ledger has no records.
    pub fn is_empty(&self) -> StateResult<bool> {
        Ok(self.records()?.is_empty())
    }

    /// Decide whether a task must be pushed to the tracker.
    ///
    /// True when the task has no record, its content hash changed, or it
    /// moved to another file since the last sync.
    pub fn needs_sync(&self, task: &Task, current_hash: &str) -> StateResult<bool> {
        Ok(match self.get(&task.ledger_key())? {
            None => true,
            Some(record) => {
                record.last_content_hash != current_hash || record.file_path != task.file_path
            }
        })
    }

    /// Keys present in the ledger but not in `valid_keys`, sorted.
    pub fn find_orphans(&self, valid_keys: &HashSet<String>) -> StateResult<Vec<String>> {
        Ok(self
            .records()?
            .keys()
            .filter(|key| !valid_keys.contains(*key))
            .cloned()
            .collect())
    }

    /// Drop every record whose key is not in `valid_keys` and return the dropped keys.
    ///
    /// Only the local ledger changes; tracker issues of orphaned tasks are
    /// left as they are.
    pub fn cleanup_orphans(&mut self, valid_keys: &HashSet<String>) -> StateResult<Vec<String>> {
        let orphans = self.find_orphans(valid_keys)?;
        let records = self.records_mut()?;
        for key in &orphans {
            records.remove(key);
        }
        Ok(orphans)
    }
}
