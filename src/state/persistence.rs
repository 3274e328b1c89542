//! Loading and saving the ledger file.

use std::collections::BTreeMap;

use tracing::debug;

use super::{StateError, StateResult, SyncRecord, SyncStateManager};

impl SyncStateManager {
    /// Read the ledger from disk.
    ///
    /// A missing file is an empty ledger. Calling `load()` again discards
    /// in-memory changes and re-reads the file.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the file exists but cannot be read and
    /// [`StateError::Malformed`] if it is not a JSON array of records.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use specsync::state::SyncStateManager;
    ///
    /// let mut state = SyncStateManager::new(".kiro/specs/.sync-state.json");
    /// state.load().unwrap();
    /// println!("{} records", state.len().unwrap());
    /// ```
    pub fn load(&mut self) -> StateResult<()> {
        if !self.path.exists() {
            debug!("No sync state at {}, starting empty", self.path.display());
            self.records = Some(BTreeMap::new());
            return Ok(());
        }

        let json = std::fs::read_to_string(&self.path).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;

        let records: Vec<SyncRecord> =
            serde_json::from_str(&json).map_err(|source| StateError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        let mut loaded = BTreeMap::new();
        for record in records {
            if loaded.contains_key(&record.task_id) {
                return Err(StateError::DuplicateKey {
                    path: self.path.clone(),
                    key: record.task_id,
                });
            }
            loaded.insert(record.task_id.clone(), record);
        }

        debug!(
            "Loaded {} sync records from {}",
            loaded.len(),
            self.path.display()
        );
        self.records = Some(loaded);
        Ok(())
    }

    /// Write the whole ledger to disk.
    ///
    /// Creates parent directories if they don't exist. The file is written
    /// to a sibling temporary file first and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()` and
    /// [`StateError::Io`] if the file cannot be written.
    pub fn save(&self) -> StateResult<()> {
        let records: Vec<&SyncRecord> = self.records()?.values().collect();

        let io_error = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let json = serde_json::to_string_pretty(&records).map_err(|source| {
            StateError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = std::path::PathBuf::from(tmp_name);
        std::fs::write(&tmp_path, json).map_err(io_error)?;
        std::fs::rename(&tmp_path, &self.path).map_err(io_error)?;

        debug!("Saved {} sync records to {}", records.len(), self.path.display());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
