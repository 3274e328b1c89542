//! Pre-flight linting of checklist documents.
//!
//! Unlike [`super::parse_tasks`], which silently tolerates bad input, the
//! validator reports every structural problem it finds. It never fails;
//! callers decide whether errors block a sync.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

use super::parsing::{parse_requirements_line, split_task_id, CHECKLIST_RE};
use super::TaskStatus;

/// Anything that starts like a checklist item, terminated bracket or not.
static CHECKLIST_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+\[").expect("checklist start pattern is valid")
});

/// Category of a structural problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseIssueKind {
    /// Explicit id used by more than one task in the document
    DuplicateId,
    /// Checkbox content other than ` `, `-`, `x` or `X`
    MalformedMarker,
    /// `- [` without a closing bracket
    UnterminatedMarker,
    /// Checklist item with nothing after the checkbox and id
    MissingTitle,
    /// Requirements annotation not attached to any task
    StrayRequirements,
}

impl fmt::Display for ParseIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DuplicateId => "duplicate id",
            Self::MalformedMarker => "malformed marker",
            Self::UnterminatedMarker => "unterminated marker",
            Self::MissingTitle => "missing title",
            Self::StrayRequirements => "stray requirements",
        };
        write!(f, "{}", name)
    }
}

/// A structural problem found on one line of a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}: {message}")]
pub struct ParseIssue {
    /// 1-based line number
    pub line: usize,
    /// Problem category
    pub kind: ParseIssueKind,
    /// Human-readable detail
    pub message: String,
}

impl ParseIssue {
    fn new(line: usize, kind: ParseIssueKind, message: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of [`validate_document`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// True when there are no errors; warnings do not affect validity
    pub valid: bool,
    /// Problems that make the document ambiguous to sync
    pub errors: Vec<ParseIssue>,
    /// Suspicious but harmless constructs
    pub warnings: Vec<ParseIssue>,
}

impl ValidationResult {
    fn from_issues(errors: Vec<ParseIssue>, warnings: Vec<ParseIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Lint a checklist document.
///
/// Flags duplicate explicit ids, malformed or unterminated checkbox
/// markers and items without a title as errors; requirement annotations
/// outside any task are warnings.
///
/// # Example
///
/// ```
/// use specsync::task::{validate_document, ParseIssueKind};
///
/// let result = validate_document("- [ ] 1 First\n- [?] 1 Again");
/// assert!(!result.valid);
/// let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
/// assert_eq!(kinds, vec![ParseIssueKind::MalformedMarker, ParseIssueKind::DuplicateId]);
/// ```
#[must_use]
pub fn validate_document(text: &str) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut seen_ids: HashMap<String, usize> = HashMap::new();
    let mut inside_task = false;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();

        if trimmed.starts_with('#') {
            inside_task = false;
            continue;
        }

        if !CHECKLIST_START_RE.is_match(line) {
            if !inside_task && parse_requirements_line(trimmed).is_some() {
                warnings.push(ParseIssue::new(
                    line_number,
                    ParseIssueKind::StrayRequirements,
                    "requirements annotation is not attached to a task",
                ));
            }
            continue;
        }

        let Some(caps) = CHECKLIST_RE.captures(line) else {
            errors.push(ParseIssue::new(
                line_number,
                ParseIssueKind::UnterminatedMarker,
                format!("checkbox is missing its closing bracket: '{}'", trimmed),
            ));
            inside_task = false;
            continue;
        };

        let marker = &caps[1];
        if !TaskStatus::is_known_marker(marker) {
            errors.push(ParseIssue::new(
                line_number,
                ParseIssueKind::MalformedMarker,
                format!("unrecognised checkbox marker '[{}]', expected [ ], [-], [x] or [X]", marker),
            ));
        }

        let (explicit_id, title) = split_task_id(&caps[2]);
        if title.is_empty() {
            errors.push(ParseIssue::new(
                line_number,
                ParseIssueKind::MissingTitle,
                "checklist item has no title",
            ));
            inside_task = false;
            continue;
        }
        inside_task = true;

        if let Some(id) = explicit_id {
            if let Some(first_line) = seen_ids.get(&id) {
                errors.push(ParseIssue::new(
                    line_number,
                    ParseIssueKind::DuplicateId,
                    format!("task id '{}' already used on line {}", id, first_line),
                ));
            } else {
                seen_ids.insert(id, line_number);
            }
        }
    }

    ValidationResult::from_issues(errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_document_is_valid() {
        let doc = "# Tasks\n\n- [ ] 1 A\n  - _Requirements: 1.1_\n- [x] 2 B\n- [-] Docs";
        let result = validate_document(doc);
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_ids_reported_with_first_line() {
        let result = validate_document("- [ ] 1.1 A\n- [ ] 1.2 B\n- [ ] 1.1 C");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ParseIssueKind::DuplicateId);
        assert_eq!(result.errors[0].line, 3);
        assert!(result.errors[0].message.contains("line 1"));
    }

    #[test]
    fn test_malformed_markers() {
        let result = validate_document("- [ -] 1 A\n- [  ] 2 B\n- [] 3 C");
        let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ParseIssueKind::MalformedMarker; 3]);
    }

    #[test]
    fn test_unterminated_marker() {
        let result = validate_document("- [ 1 Broken");
        assert_eq!(result.errors[0].kind, ParseIssueKind::UnterminatedMarker);
    }

    #[test]
    fn test_missing_title() {
        let result = validate_document("- [x] 4.2\n- [ ]");
        assert_eq!(result.errors.len(), 2);
        assert!(result
            .errors
            .iter()
            .all(|e| e.kind == ParseIssueKind::MissingTitle));
    }

    #[test]
    fn test_stray_requirements_is_warning() {
        let result = validate_document("_Requirements: 1.1_\n- [ ] 1 A");
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, ParseIssueKind::StrayRequirements);
    }

    #[test]
    fn test_requirements_after_heading_is_stray() {
        let result = validate_document("- [ ] 1 A\n## Next\n_Requirements: 1.1_");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_issue_display() {
        let issue = ParseIssue::new(4, ParseIssueKind::MissingTitle, "checklist item has no title");
        assert_eq!(issue.to_string(), "line 4: missing title: checklist item has no title");
    }
}
