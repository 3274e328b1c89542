//! Checklist document parsing.
//!
//! The parser is deliberately lenient: malformed markers fall back to
//! `NotStarted`, lines without a title are skipped, and nothing here
//! returns an error. Structural problems are reported by
//! [`super::validate_document`] instead.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use super::hashing::synthetic_id;
use super::{Task, TaskStatus};

// ============================================================================
// Line Grammar
// ============================================================================

/// `- [<marker>] <rest>` at any indentation, `*` bullets accepted.
pub(crate) static CHECKLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+\[([^\]]*)\]\s*(.*)$").expect("checklist pattern is valid")
});

/// Dotted numeric id in front of the title: `1`, `2.1`, `3.2.1`, `1.`.
static TASK_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)*)\.?(?:\s+(.*))?$").expect("task id pattern is valid")
});

/// `_Requirements: 1.1, 2.3_`, optionally as a bullet.
static REQUIREMENTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[-*]\s+)?_requirements:\s*(.*?)_\s*$")
        .expect("requirements pattern is valid")
});

/// Split the text after the checkbox into `(explicit id, title)`.
pub(crate) fn split_task_id(rest: &str) -> (Option<String>, String) {
    let rest = rest.trim();
    match TASK_ID_RE.captures(rest) {
        Some(caps) => {
            let id = caps.get(1).map(|m| m.as_str().to_string());
            let title = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            (id, title)
        }
        None => (None, rest.to_string()),
    }
}

/// Extract requirement tokens from an annotation line.
///
/// Returns `None` when the line is not a requirements annotation.
pub(crate) fn parse_requirements_line(line: &str) -> Option<Vec<String>> {
    let caps = REQUIREMENTS_RE.captures(line.trim())?;
    let tokens = caps
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect();
    Some(tokens)
}

fn is_heading(trimmed: &str) -> bool {
    trimmed.starts_with('#')
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Derive the spec group from a document path.
///
/// The group is the name of the directory holding the document, so
/// `.kiro/specs/auth-flow/tasks.md` belongs to `auth-flow`. Paths without a
/// parent directory belong to `default`.
///
/// # Example
///
/// ```
/// use specsync::task::spec_group_for;
///
/// assert_eq!(spec_group_for(".kiro/specs/auth-flow/tasks.md"), "auth-flow");
/// assert_eq!(spec_group_for("tasks.md"), "default");
/// ```
#[must_use]
pub fn spec_group_for(file_path: &str) -> String {
    Path::new(file_path)
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("default")
        .to_string()
}

// ============================================================================
// Parser
// ============================================================================

/// A task under construction, before ids are finalised.
struct TaskDraft {
    explicit_id: Option<String>,
    title: String,
    status: TaskStatus,
    line_number: usize,
    indent: usize,
    description_lines: Vec<String>,
    requirements: Vec<String>,
}

impl TaskDraft {
    fn description(&self) -> Option<String> {
        if self.description_lines.is_empty() {
            None
        } else {
            Some(self.description_lines.join("\n"))
        }
    }
}

/// Parse every checklist item in `text`.
///
/// Tasks come back in document order. Explicit ids are kept as written;
/// tasks without one get a synthetic id derived from their content, made
/// unique within the document with a numeric suffix.
///
/// # Example
///
/// ```
/// use specsync::task::{parse_tasks, TaskStatus};
///
/// let doc = "\
/// # Tasks
///
/// - [x] 1. Set up project
///   - Create the crate
/// - [-] 2.1 Implement parser
///   - _Requirements: 2.1, 2.2_
/// - [ ] Write docs
/// ";
///
/// let tasks = parse_tasks(doc, ".kiro/specs/core/tasks.md");
/// assert_eq!(tasks.len(), 3);
/// assert_eq!(tasks[0].id, "1");
/// assert_eq!(tasks[0].status, TaskStatus::Completed);
/// assert_eq!(tasks[0].description.as_deref(), Some("- Create the crate"));
/// assert_eq!(tasks[1].requirements, vec!["2.1", "2.2"]);
/// assert!(tasks[2].id.starts_with("t-"));
/// ```
#[must_use]
pub fn parse_tasks(text: &str, file_path: &str) -> Vec<Task> {
    let spec_group = spec_group_for(file_path);
    let mut drafts: Vec<TaskDraft> = Vec::new();
    let mut current: Option<TaskDraft> = None;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;

        // A checklist line always closes the previous task
        if let Some(caps) = CHECKLIST_RE.captures(line) {
            drafts.extend(current.take());

            let status = TaskStatus::from_marker(&caps[1]);
            let (explicit_id, title) = split_task_id(&caps[2]);
            if title.is_empty() {
                debug!("Skipping checklist item without title at {}:{}", file_path, line_number);
                continue;
            }

            current = Some(TaskDraft {
                explicit_id,
                title,
                status,
                line_number,
                indent: indent_of(line),
                description_lines: Vec::new(),
                requirements: Vec::new(),
            });
            continue;
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Description lines sit deeper than their checklist item
        if is_heading(trimmed) || indent_of(line) <= draft.indent {
            drafts.extend(current.take());
            continue;
        }
        if let Some(requirements) = parse_requirements_line(trimmed) {
            draft.requirements.extend(requirements);
            continue;
        }
        draft.description_lines.push(trimmed.to_string());
    }
    drafts.extend(current.take());

    assign_ids(drafts, file_path, &spec_group)
}

/// Finalise ids: explicit ids first, then synthetic ids that avoid them.
fn assign_ids(drafts: Vec<TaskDraft>, file_path: &str, spec_group: &str) -> Vec<Task> {
    let mut used: HashSet<String> = drafts
        .iter()
        .filter_map(|draft| draft.explicit_id.clone())
        .collect();

    drafts
        .into_iter()
        .map(|draft| {
            let description = draft.description();
            let id = match draft.explicit_id {
                Some(id) => id,
                None => {
                    let base = synthetic_id(spec_group, &draft.title, description.as_deref());
                    let mut candidate = base.clone();
                    let mut suffix = 2;
                    while used.contains(&candidate) {
                        candidate = format!("{}-{}", base, suffix);
                        suffix += 1;
                    }
                    used.insert(candidate.clone());
                    candidate
                }
            };

            Task {
                id,
                title: draft.title,
                description,
                status: draft.status,
                file_path: file_path.to_string(),
                line_number: draft.line_number,
                spec_group: spec_group.to_string(),
                requirements: draft.requirements,
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
