//! Ledger export and import.
//!
//! Exports wrap the records in a versioned envelope so ledgers can be
//! backed up or moved between machines:
//!
//! ```json
//! { "version": 1, "exportedAt": "2026-01-01T00:00:00Z", "states": [ ... ] }
//! ```
//!
//! Imports check the envelope and every record before touching the ledger,
//! so a rejected import leaves existing state exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::info;

use super::{StateError, StateResult, SyncRecord, SyncStateManager};

/// Envelope format version written by [`SyncStateManager::export_state`].
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Versioned export envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEnvelope {
    /// Format version
    pub version: u32,
    /// When the export was taken
    pub exported_at: DateTime<Utc>,
    /// Exported records
    pub states: Vec<SyncRecord>,
}

/// Require `field` of record `index` to be a non-empty string.
fn require_string(record: &Value, index: usize, field: &str, allow_empty: bool) -> StateResult<()> {
    match record.get(field).and_then(Value::as_str) {
        Some(value) if allow_empty || !value.trim().is_empty() => Ok(()),
        Some(_) => Err(StateError::invalid_import(format!(
            "states[{}].{} must not be empty",
            index, field
        ))),
        None => Err(StateError::invalid_import(format!(
            "states[{}].{} must be a string",
            index, field
        ))),
    }
}

/// Check the shape of one record value before deserializing it.
fn validate_record(record: &Value, index: usize) -> StateResult<()> {
    if !record.is_object() {
        return Err(StateError::invalid_import(format!(
            "states[{}] must be an object",
            index
        )));
    }

    require_string(record, index, "taskId", false)?;
    require_string(record, index, "lastContentHash", false)?;
    require_string(record, index, "filePath", true)?;

    match record.get("trackerIssueNumber").and_then(Value::as_u64) {
        Some(number) if number > 0 => {}
        _ => {
            return Err(StateError::invalid_import(format!(
                "states[{}].trackerIssueNumber must be a positive integer",
                index
            )))
        }
    }

    let synced_at = record.get("lastSyncedAt").and_then(Value::as_str);
    if synced_at
        .map(DateTime::parse_from_rfc3339)
        .and_then(Result::ok)
        .is_none()
    {
        return Err(StateError::invalid_import(format!(
            "states[{}].lastSyncedAt must be an RFC 3339 timestamp",
            index
        )));
    }

    Ok(())
}

/// Validate an envelope and decode its records without side effects.
fn decode_envelope(json: &str) -> StateResult<Vec<SyncRecord>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| StateError::invalid_import(format!("not valid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(StateError::invalid_import("envelope must be a JSON object"));
    }

    match value.get("version").and_then(Value::as_u64) {
        Some(version) if version == u64::from(STATE_FORMAT_VERSION) => {}
        Some(version) => {
            return Err(StateError::invalid_import(format!(
                "unsupported version {} (expected {})",
                version, STATE_FORMAT_VERSION
            )))
        }
        None => return Err(StateError::invalid_import("missing numeric 'version'")),
    }

    if value
        .get("exportedAt")
        .and_then(Value::as_str)
        .map(DateTime::parse_from_rfc3339)
        .and_then(Result::ok)
        .is_none()
    {
        return Err(StateError::invalid_import(
            "'exportedAt' must be an RFC 3339 timestamp",
        ));
    }

    let Some(states) = value.get("states").and_then(Value::as_array) else {
        return Err(StateError::invalid_import("'states' must be an array"));
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(states.len());
    for (index, state) in states.iter().enumerate() {
        validate_record(state, index)?;
        let record: SyncRecord = serde_json::from_value(state.clone())
            .map_err(|e| StateError::invalid_import(format!("states[{}]: {}", index, e)))?;
        if !seen.insert(record.task_id.clone()) {
            return Err(StateError::invalid_import(format!(
                "states[{}].taskId '{}' appears more than once",
                index, record.task_id
            )));
        }
        records.push(record);
    }

    Ok(records)
}

impl SyncStateManager {
    /// Serialize the ledger into a versioned export envelope.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()`.
    pub fn export_state(&self) -> StateResult<String> {
        let envelope = StateEnvelope {
            version: STATE_FORMAT_VERSION,
            exported_at: Utc::now(),
            states: self.records()?.values().cloned().collect(),
        };
        serde_json::to_string_pretty(&envelope).map_err(|source| StateError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Merge records from an export envelope into the ledger.
    ///
    /// Every record is validated first; on any violation nothing is
    /// changed. Records with a key already in the ledger replace it.
    /// Returns the number of imported records. The ledger is not saved.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotLoaded`] before `load()` and
    /// [`StateError::InvalidImport`] for structural violations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use specsync::state::SyncStateManager;
    ///
    /// let mut source = SyncStateManager::new("old/.sync-state.json");
    /// source.load().unwrap();
    /// let exported = source.export_state().unwrap();
    ///
    /// let mut target = SyncStateManager::new("new/.sync-state.json");
    /// target.load().unwrap();
    /// target.import_state(&exported).unwrap();
    /// target.save().unwrap();
    /// ```
    pub fn import_state(&mut self, json: &str) -> StateResult<usize> {
        // Fail on an unloaded ledger before doing any work
        self.records()?;
        let records = decode_envelope(json)?;
        let count = records.len();

        let ledger = self.records_mut()?;
        for record in records {
            ledger.insert(record.task_id.clone(), record);
        }

        info!("Imported {} sync records", count);
        Ok(count)
    }
}
