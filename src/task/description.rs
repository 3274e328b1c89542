//! Issue body rendering.

use super::Task;

/// Marker appended to every generated issue body.
pub const AUTO_GENERATED_MARKER: &str =
    "_This issue is auto-generated from a spec task list. Edits made here are not synced back to the document._";

/// Render the tracker issue body for a task.
///
/// The body starts with the task description (or a placeholder), then any
/// extra context, then a metadata footer. The output depends only on the
/// arguments.
///
/// # Example
///
/// ```
/// use specsync::task::{generate_issue_description, parse_tasks, AUTO_GENERATED_MARKER};
///
/// let tasks = parse_tasks(
///     "- [-] 2.1 Parser\n  - handle bullets\n  - _Requirements: 1.1_",
///     "specs/core/tasks.md",
/// );
/// let body = generate_issue_description(&tasks[0], None);
/// assert!(body.starts_with("- handle bullets"));
/// assert!(body.contains("**Source:** `specs/core/tasks.md:1`"));
/// assert!(body.contains("**Requirements:** 1.1"));
/// assert!(body.ends_with(AUTO_GENERATED_MARKER));
/// ```
#[must_use]
pub fn generate_issue_description(task: &Task, extra_context: Option<&str>) -> String {
    let mut body = String::new();

    match task.description.as_deref() {
        Some(description) if !description.trim().is_empty() => body.push_str(description),
        _ => body.push_str("_No description provided._"),
    }
    body.push_str("\n\n");

    if let Some(context) = extra_context.map(str::trim).filter(|c| !c.is_empty()) {
        body.push_str(context);
        body.push_str("\n\n");
    }

    body.push_str("---\n\n");
    body.push_str(&format!("**Task ID:** {}\n", task.id));
    body.push_str(&format!("**Spec:** {}\n", task.spec_group));
    body.push_str(&format!("**Status:** {}\n", task.status));
    body.push_str(&format!("**Source:** `{}`\n", task.source_location()));
    if !task.requirements.is_empty() {
        body.push_str(&format!("**Requirements:** {}\n", task.requirements.join(", ")));
    }
    body.push('\n');
    body.push_str(AUTO_GENERATED_MARKER);

    body
}
