//! Crate-level error type.
//!
//! Module errors ([`StateError`], [`TrackerError`]) stay typed inside their
//! modules; [`SyncError`] wraps them for callers that drive a whole run and
//! maps every failure to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::state::StateError;
use crate::tracker::{ErrorKind, TrackerError};

/// Main error type for specsync operations
#[derive(Error, Debug)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Document Errors
    // =========================================================================
    /// Spec documents could not be enumerated or read
    #[error("Document discovery failed at {path}: {message}")]
    Discovery { path: PathBuf, message: String },

    /// One or more documents failed validation
    #[error("{count} document(s) failed validation")]
    InvalidDocuments { count: usize },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// Ledger failure
    #[error(transparent)]
    State(#[from] StateError),

    /// Tracker failure
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Discovery {
            path: path.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error invalidates the whole run rather than one task
    pub fn is_run_level(&self) -> bool {
        match self {
            Self::Tracker(e) => e.kind() == ErrorKind::Configuration,
            _ => true,
        }
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::InvalidConfig { .. } => 2,
            Self::Tracker(e) if e.kind() == ErrorKind::Configuration => 2,
            Self::State(_) => 3,
            Self::Discovery { .. } => 4,
            Self::Tracker(e)
                if matches!(e.kind(), ErrorKind::Authentication | ErrorKind::Forbidden) =>
            {
                5
            }
            _ => 1,
        }
    }
}

/// Type alias for specsync results
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::invalid_config("tracker.repository", "must be owner/name");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: tracker.repository - must be owner/name"
        );
    }

    #[test]
    fn test_wrapped_errors_are_transparent() {
        let err: SyncError = StateError::NotLoaded.into();
        assert_eq!(err.to_string(), StateError::NotLoaded.to_string());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SyncError::config("bad").exit_code(), 2);
        assert_eq!(
            SyncError::from(TrackerError::configuration("bad repo")).exit_code(),
            2
        );
        assert_eq!(SyncError::from(StateError::NotLoaded).exit_code(), 3);
        assert_eq!(SyncError::discovery("specs", "denied").exit_code(), 4);
        assert_eq!(
            SyncError::from(TrackerError::from_response(401, "")).exit_code(),
            5
        );
        assert_eq!(
            SyncError::from(TrackerError::transient("reset")).exit_code(),
            1
        );
        assert_eq!(SyncError::InvalidDocuments { count: 2 }.exit_code(), 1);
    }

    #[test]
    fn test_is_run_level() {
        assert!(SyncError::from(StateError::NotLoaded).is_run_level());
        assert!(!SyncError::from(TrackerError::from_response(404, "")).is_run_level());
    }
}
