//! Checklist task model and parsing.
//!
//! Spec documents carry their work items as markdown checklists:
//!
//! ```text
//! - [x] 1. Set up project structure
//!   - Create crate layout
//!   - _Requirements: 1.1, 1.2_
//! - [-] 2.1 Implement parser
//! - [ ] Write docs
//! ```
//!
//! This module turns such documents into [`Task`] records and provides the
//! pieces the reconciler needs on top of them:
//!
//! - [`parse_tasks`] - lenient parser, never fails on malformed lines
//! - [`validate_document`] - strict lint used before a sync
//! - [`generate_content_hash`] - fingerprint over the semantic fields
//! - [`generate_issue_description`] - issue body rendering
//!
//! # Architecture
//!
//! ```text
//! document text ──parse_tasks──> Vec<Task> ──generate_content_hash──> String
//!       │                            │
//!       └──validate_document──>      └──generate_issue_description──> issue body
//!          ValidationResult
//! ```

mod description;
mod hashing;
mod parsing;
mod validation;

pub use description::{generate_issue_description, AUTO_GENERATED_MARKER};
pub use hashing::{
    are_equivalent, bounded_label, generate_content_hash, synthetic_id, MAX_LABEL_LEN,
};
pub use parsing::{parse_tasks, spec_group_for};
pub use validation::{validate_document, ParseIssue, ParseIssueKind, ValidationResult};

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Task Status
// ============================================================================

/// Status of a checklist item, taken from its checkbox marker.
///
/// | Marker          | Status       |
/// |-----------------|--------------|
/// | `[ ]`           | `NotStarted` |
/// | `[-]`           | `InProgress` |
/// | `[x]` / `[X]`   | `Completed`  |
/// | anything else   | `NotStarted` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Unchecked box
    #[default]
    NotStarted,
    /// `[-]` marker
    InProgress,
    /// Checked box
    Completed,
}

impl TaskStatus {
    /// Map the text between the checkbox brackets to a status.
    ///
    /// Unknown markers fall back to `NotStarted`.
    ///
    /// # Example
    ///
    /// ```
    /// use specsync::task::TaskStatus;
    ///
    /// assert_eq!(TaskStatus::from_marker("x"), TaskStatus::Completed);
    /// assert_eq!(TaskStatus::from_marker("-"), TaskStatus::InProgress);
    /// assert_eq!(TaskStatus::from_marker(" -"), TaskStatus::NotStarted);
    /// ```
    #[must_use]
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "x" | "X" => Self::Completed,
            "-" => Self::InProgress,
            _ => Self::NotStarted,
        }
    }

    /// Whether `marker` is one of the recognised checkbox markers.
    #[must_use]
    pub fn is_known_marker(marker: &str) -> bool {
        matches!(marker, " " | "-" | "x" | "X")
    }

    /// Stable machine name (`not_started`, `in_progress`, `completed`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Check if this status maps to a closed tracker issue.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::NotStarted => write!(f, "Not Started"),
            TaskStatus::InProgress => write!(f, "In Progress"),
            TaskStatus::Completed => write!(f, "Completed"),
        }
    }
}

// ============================================================================
// Task
// ============================================================================

/// A single checklist item parsed from a spec document.
///
/// Tasks are rebuilt on every parse and never persisted; the ledger only
/// remembers their key, fingerprint and source path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Dotted numeric id from the document (`2.1`) or a synthetic `t-xxxxxxxx` id
    pub id: String,
    /// Checklist line text after the id
    pub title: String,
    /// Detail lines following the checklist line
    pub description: Option<String>,
    /// Checkbox status
    pub status: TaskStatus,
    /// Path of the document the task came from
    pub file_path: String,
    /// 1-based line of the checklist item
    pub line_number: usize,
    /// Name of the spec directory owning the document
    pub spec_group: String,
    /// Requirement references from the `_Requirements: ..._` annotation, in document order
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl Task {
    /// Key the task is tracked under in the sync ledger.
    ///
    /// Explicit ids repeat across spec groups (every spec has a task `1`),
    /// so the key is qualified by the group.
    ///
    /// # Example
    ///
    /// ```
    /// use specsync::task::parse_tasks;
    ///
    /// let tasks = parse_tasks("- [ ] 1.2 Add login", ".kiro/specs/auth/tasks.md");
    /// assert_eq!(tasks[0].ledger_key(), "auth/1.2");
    /// ```
    #[must_use]
    pub fn ledger_key(&self) -> String {
        format!("{}/{}", self.spec_group, self.id)
    }

    /// Tracker label identifying the issue created for this task.
    ///
    /// Shortened with a digest when the key would exceed GitHub's label limit.
    #[must_use]
    pub fn tracker_label(&self) -> String {
        bounded_label("task:", &self.ledger_key())
    }

    /// Tracker label shared by every task of the spec group.
    #[must_use]
    pub fn spec_label(&self) -> String {
        bounded_label("spec:", &self.spec_group)
    }

    /// `file:line` pointer back to the source document.
    #[must_use]
    pub fn source_location(&self) -> String {
        format!("{}:{}", self.file_path, self.line_number)
    }

    /// Check if the task is checked off.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.ledger_key(), self.title, self.status)
    }
}
