//! Converging spec documents with tracker issues.
//!
//! # Architecture
//!
//! ```text
//! SourceDocument ──parse──> Task ──hash──> needs_sync?
//!                                             │ no  ──> Unchanged
//!                                             │ yes
//!                       ledger record? ───────┤
//!                  yes: update_issue          │ no: IssueLookupCache / find_issue_by_label
//!                       close/reopen          │     found: adopt (update)
//!                                             │     else:  create_issue, close if done
//!                                             ▼
//!                             SyncStateManager::update + save (per mutation)
//! ```
//!
//! A task's tracker failure is recorded and the run moves on. Ledger save
//! failures abort the run, because later mutations could not be recorded.

mod cache;
mod discovery;
mod report;
mod status;

pub use cache::IssueLookupCache;
pub use discovery::{discover_documents, SourceDocument};
pub use report::{FailureKind, ReconcileReport, SyncAction, TaskFailure, TaskOutcome};
pub use status::{compute_status, StatusEntry, SyncStatus};

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::state::{StateError, SyncStateManager};
use crate::task::{generate_content_hash, generate_issue_description, parse_tasks, Task};
use crate::tracker::{IssueState, IssueUpdate, TrackerClient, TrackerError};

/// Hash stored between the mutations of a multi-step sync, so the task is
/// retried on the next run while its issue number is already known.
const UNCONFIRMED_HASH: &str = "unconfirmed";

/// Knobs for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Plan only: no tracker mutation, no ledger write
    pub dry_run: bool,
    /// Labels added to every created issue
    pub labels: Vec<String>,
    /// Text inserted into every issue body
    pub extra_context: Option<String>,
}

/// Failure of one task: either recorded and skipped, or fatal to the run.
enum TaskError {
    Failed(TaskFailure),
    Abort(SyncError),
}

/// Drives one reconciliation pass.
pub struct Reconciler<'a> {
    client: &'a TrackerClient,
    state: &'a mut SyncStateManager,
    cache: &'a mut IssueLookupCache,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        client: &'a TrackerClient,
        state: &'a mut SyncStateManager,
        cache: &'a mut IssueLookupCache,
    ) -> Self {
        Self {
            client,
            state,
            cache,
            options: ReconcileOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Synchronize every task in `documents`.
    ///
    /// # Errors
    ///
    /// Returns an error only for run-level failures: an unloaded ledger or a
    /// ledger that cannot be saved. Per-task failures are in the report.
    pub async fn reconcile(
        &mut self,
        documents: &[SourceDocument],
    ) -> Result<ReconcileReport, SyncError> {
        if !self.state.is_loaded() {
            return Err(StateError::NotLoaded.into());
        }

        let mut report = ReconcileReport::new(self.options.dry_run);
        let mut seen = HashSet::new();

        for document in documents {
            let tasks = parse_tasks(&document.content, &document.relative_path);
            debug!("{}: {} task(s)", document.relative_path, tasks.len());

            for task in tasks {
                if !seen.insert(task.ledger_key()) {
                    let failure = TaskFailure::duplicate(&task);
                    warn!("{}", failure);
                    report.failures.push(failure);
                    continue;
                }

                let hash = generate_content_hash(&task);
                match self.sync_task(&task, &hash).await {
                    Ok(outcome) => report.outcomes.push(outcome),
                    Err(TaskError::Failed(failure)) => {
                        warn!("{}", failure);
                        report.failures.push(failure);
                    }
                    Err(TaskError::Abort(error)) => return Err(error),
                }
            }
        }

        if self.options.dry_run {
            report.orphans = self.state.find_orphans(&seen)?;
        } else {
            report.orphans = self.state.cleanup_orphans(&seen)?;
            self.state.save()?;
        }
        if !report.orphans.is_empty() {
            info!(
                "Dropped {} orphaned ledger entr{}",
                report.orphans.len(),
                if report.orphans.len() == 1 { "y" } else { "ies" }
            );
        }

        info!("{}", report.summary());
        Ok(report)
    }

    async fn sync_task(&mut self, task: &Task, hash: &str) -> Result<TaskOutcome, TaskError> {
        let key = task.ledger_key();
        let state_failure =
            |e: StateError| TaskError::Failed(TaskFailure::new(task, FailureKind::State, e.to_string()));

        let record = self.state.get(&key).map_err(state_failure)?.cloned();
        if !self.state.needs_sync(task, hash).map_err(state_failure)? {
            let number = record.map(|r| r.tracker_issue_number);
            return Ok(TaskOutcome::new(task, SyncAction::Unchanged, number));
        }

        let body = generate_issue_description(task, self.options.extra_context.as_deref());
        match record {
            Some(record) => {
                self.update_known(task, hash, record.tracker_issue_number, &body)
                    .await
            }
            None => {
                let label = task.tracker_label();
                let found = self
                    .lookup(&label)
                    .await
                    .map_err(|e| tracker_failure(task, &e))?;
                match found {
                    Some(number) => self.adopt(task, hash, number, &body).await,
                    None => self.create(task, hash, &label, &body).await,
                }
            }
        }
    }

    async fn lookup(&mut self, label: &str) -> Result<Option<u64>, TrackerError> {
        if let Some(number) = self.cache.get(label) {
            return Ok(Some(number));
        }
        let found = self.client.find_issue_by_label(label).await?;
        if let Some(issue) = &found {
            debug!("Found existing issue #{} for {}", issue.number, label);
            self.cache.insert(label, issue.number);
        }
        Ok(found.map(|issue| issue.number))
    }

    fn labels_for(&self, task: &Task, task_label: &str) -> Vec<String> {
        let mut labels = Vec::new();
        for label in self
            .options
            .labels
            .iter()
            .cloned()
            .chain([task.spec_label(), task_label.to_string()])
        {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    /// Record a mutation in the ledger and persist it.
    fn commit(&mut self, task: &Task, issue_number: u64, hash: &str) -> Result<(), TaskError> {
        self.state
            .update(&task.ledger_key(), issue_number, hash, &task.file_path)
            .map_err(|e| TaskError::Failed(TaskFailure::new(task, FailureKind::State, e.to_string())))?;
        self.state
            .save()
            .map_err(|e| TaskError::Abort(SyncError::State(e)))
    }

    async fn create(
        &mut self,
        task: &Task,
        hash: &str,
        label: &str,
        body: &str,
    ) -> Result<TaskOutcome, TaskError> {
        let transition = task.is_completed().then_some(IssueState::Closed);
        if self.options.dry_run {
            return Ok(TaskOutcome::new(task, SyncAction::Create, None).with_transition(transition));
        }

        let labels = self.labels_for(task, label);
        let issue = self
            .client
            .create_issue(&task.title, body, &labels)
            .await
            .map_err(|e| tracker_failure(task, &e))?;
        self.cache.insert(label, issue.number);

        if transition.is_some() {
            self.commit(task, issue.number, UNCONFIRMED_HASH)?;
            self.client
                .close_issue(issue.number)
                .await
                .map_err(|e| tracker_failure(task, &e))?;
        }
        self.commit(task, issue.number, hash)?;

        Ok(TaskOutcome::new(task, SyncAction::Create, Some(issue.number)).with_transition(transition))
    }

    async fn adopt(
        &mut self,
        task: &Task,
        hash: &str,
        number: u64,
        body: &str,
    ) -> Result<TaskOutcome, TaskError> {
        if self.options.dry_run {
            return Ok(TaskOutcome::new(task, SyncAction::Adopt, Some(number)));
        }

        let update = IssueUpdate::new()
            .with_title(&task.title)
            .with_body(body)
            .with_state(IssueState::for_completion(task.is_completed()));
        self.client
            .update_issue(number, &update)
            .await
            .map_err(|e| tracker_failure(task, &e))?;
        self.commit(task, number, hash)?;

        info!("Adopted issue #{} for {}", number, task.ledger_key());
        Ok(TaskOutcome::new(task, SyncAction::Adopt, Some(number)))
    }

    async fn update_known(
        &mut self,
        task: &Task,
        hash: &str,
        number: u64,
        body: &str,
    ) -> Result<TaskOutcome, TaskError> {
        let desired = IssueState::for_completion(task.is_completed());
        if self.options.dry_run {
            let issue = self
                .client
                .get_issue(number)
                .await
                .map_err(|e| tracker_failure(task, &e))?;
            let transition = (issue.state != desired).then_some(desired);
            return Ok(TaskOutcome::new(task, SyncAction::Update, Some(number))
                .with_transition(transition));
        }

        let update = IssueUpdate::new().with_title(&task.title).with_body(body);
        let issue = self
            .client
            .update_issue(number, &update)
            .await
            .map_err(|e| tracker_failure(task, &e))?;

        let transition = (issue.state != desired).then_some(desired);
        if let Some(target) = transition {
            self.commit(task, number, UNCONFIRMED_HASH)?;
            let result = match target {
                IssueState::Closed => self.client.close_issue(number).await,
                IssueState::Open => self.client.reopen_issue(number).await,
            };
            result.map_err(|e| tracker_failure(task, &e))?;
        }
        self.commit(task, number, hash)?;

        Ok(TaskOutcome::new(task, SyncAction::Update, Some(number)).with_transition(transition))
    }
}

fn tracker_failure(task: &Task, error: &TrackerError) -> TaskError {
    TaskError::Failed(TaskFailure::tracker(task, error))
}
