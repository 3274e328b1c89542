//! Per-run results of reconciliation.

use colored::Colorize;
use serde::Serialize;
use std::fmt;

use crate::task::Task;
use crate::tracker::{ErrorKind, IssueState, TrackerError};

/// What the reconciler did (or would do) for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// New issue created
    Create,
    /// Existing issue found by label and taken over
    Adopt,
    /// Known issue updated with new content
    Update,
    /// Nothing to do
    Unchanged,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Adopt => "adopt",
            Self::Update => "update",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{}", name)
    }
}

/// Result for one task that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub key: String,
    pub file: String,
    pub title: String,
    pub action: SyncAction,
    /// Issue number; `None` for a create planned in a dry run
    pub issue_number: Option<u64>,
    /// State change applied after the content mutation
    pub transition: Option<IssueState>,
}

impl TaskOutcome {
    pub fn new(task: &Task, action: SyncAction, issue_number: Option<u64>) -> Self {
        Self {
            key: task.ledger_key(),
            file: task.source_location(),
            title: task.title.clone(),
            action,
            issue_number,
            transition: None,
        }
    }

    #[must_use]
    pub fn with_transition(mut self, transition: Option<IssueState>) -> Self {
        self.transition = transition;
        self
    }
}

/// Why a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "detail")]
pub enum FailureKind {
    /// Ledger key already produced earlier in the same run
    DuplicateKey,
    /// Ledger access failed for this task
    State,
    /// Tracker call failed
    Tracker(ErrorKind),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey => write!(f, "duplicate key"),
            Self::State => write!(f, "ledger error"),
            Self::Tracker(kind) => write!(f, "{}", kind),
        }
    }
}

/// A task that could not be synchronized. Its ledger entry is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub key: String,
    /// `path:line` of the task
    pub file: String,
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(task: &Task, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            key: task.ledger_key(),
            file: task.source_location(),
            kind,
            message: message.into(),
        }
    }

    pub fn duplicate(task: &Task) -> Self {
        Self::new(
            task,
            FailureKind::DuplicateKey,
            format!("task key '{}' already seen in this run", task.ledger_key()),
        )
    }

    pub fn tracker(task: &Task, error: &TrackerError) -> Self {
        Self::new(task, FailureKind::Tracker(error.kind()), error.to_string())
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}: {}", self.key, self.file, self.kind, self.message)
    }
}

/// Everything that happened in one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub outcomes: Vec<TaskOutcome>,
    pub failures: Vec<TaskFailure>,
    /// Ledger keys with no task in any document
    pub orphans: Vec<String>,
}

impl ReconcileReport {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    fn count(&self, action: SyncAction) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    fn count_transitions(&self, state: IssueState) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.transition == Some(state))
            .count()
    }

    pub fn created(&self) -> usize {
        self.count(SyncAction::Create)
    }

    pub fn adopted(&self) -> usize {
        self.count(SyncAction::Adopt)
    }

    pub fn updated(&self) -> usize {
        self.count(SyncAction::Update)
    }

    pub fn unchanged(&self) -> usize {
        self.count(SyncAction::Unchanged)
    }

    pub fn closed(&self) -> usize {
        self.count_transitions(IssueState::Closed)
    }

    pub fn reopened(&self) -> usize {
        self.count_transitions(IssueState::Open)
    }

    /// Tasks that needed work, failed or not.
    pub fn attempted(&self) -> usize {
        self.failures.len() + self.outcomes.len() - self.unchanged()
    }

    /// True when at least one task needed work and every one of them failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.failures.is_empty() && self.failures.len() == self.attempted()
    }

    /// Process exit code for this run.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.all_failed() {
            1
        } else {
            0
        }
    }

    /// One-line plain summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}created {}, adopted {}, updated {}, unchanged {}, closed {}, reopened {}, failed {}, orphaned {}",
            if self.dry_run { "[dry run] " } else { "" },
            self.created(),
            self.adopted(),
            self.updated(),
            self.unchanged(),
            self.closed(),
            self.reopened(),
            self.failures.len(),
            self.orphans.len()
        )
    }

    /// Multi-line colored report for the terminal.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let verb = if self.dry_run { "would" } else { "did" };

        for outcome in self.outcomes.iter().filter(|o| o.action != SyncAction::Unchanged) {
            let issue = outcome
                .issue_number
                .map_or_else(|| "new issue".to_string(), |n| format!("#{}", n));
            let transition = outcome
                .transition
                .map(|s| format!(" then {}", if s == IssueState::Closed { "close" } else { "reopen" }))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {} {} {}{} {} ({})\n",
                "•".green(),
                verb,
                outcome.action.to_string().green(),
                transition,
                outcome.key.bold(),
                issue
            ));
        }

        for failure in &self.failures {
            out.push_str(&format!("  {} {}\n", "✗".red(), failure));
        }

        if !self.orphans.is_empty() {
            out.push_str(&format!(
                "  {} {} orphaned ledger entr{} (tracker issues untouched): {}\n",
                "!".yellow(),
                self.orphans.len(),
                if self.orphans.len() == 1 { "y" } else { "ies" },
                self.orphans.join(", ")
            ));
        }

        let summary = self.summary();
        if self.all_failed() {
            out.push_str(&summary.red().to_string());
        } else if self.failures.is_empty() {
            out.push_str(&summary.green().to_string());
        } else {
            out.push_str(&summary.yellow().to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::parse_tasks;

    fn task() -> Task {
        parse_tasks("- [ ] 1 Build", ".kiro/specs/core/tasks.md").remove(0)
    }

    fn outcome(action: SyncAction) -> TaskOutcome {
        TaskOutcome::new(&task(), action, Some(1))
    }

    #[test]
    fn test_counts() {
        let mut report = ReconcileReport::new(false);
        report.outcomes = vec![
            outcome(SyncAction::Create).with_transition(Some(IssueState::Closed)),
            outcome(SyncAction::Update).with_transition(Some(IssueState::Open)),
            outcome(SyncAction::Unchanged),
            outcome(SyncAction::Adopt),
        ];
        assert_eq!(report.created(), 1);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.adopted(), 1);
        assert_eq!(report.unchanged(), 1);
        assert_eq!(report.closed(), 1);
        assert_eq!(report.reopened(), 1);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_all_failed() {
        let mut report = ReconcileReport::new(false);
        assert!(!report.all_failed());

        report.outcomes.push(outcome(SyncAction::Unchanged));
        report
            .failures
            .push(TaskFailure::tracker(&task(), &TrackerError::transient("reset")));
        assert!(report.all_failed());
        assert_eq!(report.exit_code(), 1);

        report.outcomes.push(outcome(SyncAction::Update));
        assert!(!report.all_failed());
    }

    #[test]
    fn test_failure_display() {
        let failure = TaskFailure::duplicate(&task());
        assert_eq!(failure.file, ".kiro/specs/core/tasks.md:1");
        assert!(failure.to_string().starts_with("core/1 (.kiro/specs/core/tasks.md:1): duplicate key"));
    }

    #[test]
    fn test_summary_and_json() {
        let mut report = ReconcileReport::new(true);
        report.orphans.push("old/1".to_string());
        assert!(report.summary().starts_with("[dry run] created 0"));
        assert!(report.summary().ends_with("orphaned 1"));

        report
            .failures
            .push(TaskFailure::tracker(&task(), &TrackerError::from_response(404, "")));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failures"][0]["kind"]["type"], "tracker");
        assert_eq!(json["failures"][0]["kind"]["detail"], "not_found");
    }
}
