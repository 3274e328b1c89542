//! specsync - checklist tasks to GitHub issues
//!
//! Keeps the `- [ ]` tasks of spec documents (`.kiro/specs/<group>/tasks.md`)
//! mirrored as GitHub issues, one issue per task, across repeated runs.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`task`] - Checklist parsing, content hashing, issue bodies and linting
//! - [`state`] - The sync ledger mapping task keys to issue numbers
//! - [`tracker`] - GitHub REST client with retry and rate-limit handling
//! - [`reconcile`] - Discovery, reconciliation runs and offline status
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Run-level error type and exit codes
//! - [`testing`] - Test doubles for the tracker transport and clock
//!
//! # Example
//!
//! ```rust,ignore
//! use specsync::{discover_documents, IssueLookupCache, Reconciler, SyncConfig};
//! use specsync::{SyncStateManager, TrackerClient};
//!
//! let config = SyncConfig::load(project)?.with_overrides(None, Some(token));
//! let client = TrackerClient::new(&config.tracker)?;
//! let mut state = SyncStateManager::new(config.ledger_path(project));
//! state.load()?;
//!
//! let documents = discover_documents(project, &config.specs_dir(project), &config.task_file)?;
//! let mut cache = IssueLookupCache::new();
//! let report = Reconciler::new(&client, &mut state, &mut cache)
//!     .with_options(config.reconcile_options(false))
//!     .reconcile(&documents)
//!     .await?;
//! println!("{}", report.summary());
//! ```

pub mod config;
pub mod error;
pub mod reconcile;
pub mod state;
pub mod task;
pub mod testing;
pub mod tracker;

// Re-export commonly used types
pub use error::{Result, SyncError};

pub use config::{ConfigValidator, SyncConfig, ValidationReport};

pub use task::{
    generate_content_hash, generate_issue_description, parse_tasks, validate_document, Task,
    TaskStatus,
};

pub use state::{StateError, SyncRecord, SyncStateManager};

pub use tracker::{
    ErrorKind, IssueState, IssueUpdate, TrackerClient, TrackerConfig, TrackerError, TrackerIssue,
};

pub use reconcile::{
    compute_status, discover_documents, IssueLookupCache, ReconcileOptions, ReconcileReport,
    Reconciler, SourceDocument, SyncStatus,
};
