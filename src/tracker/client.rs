//! The tracker client and its request executor.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{RepoSlug, TrackerConfig};
use super::error::{ErrorKind, TrackerError, TrackerResult};
use super::rate_limit::{RateLimitGate, RateLimitSnapshot};
use super::retry::{Clock, RetryPolicy, SystemClock};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use super::{ConnectionReport, IssuePayload, IssueState, IssueUpdate, TrackerIssue};

/// Client for one repository's issues.
///
/// All operations go through a single executor that gates on the known
/// quota and retries transient failures. Calls are sequential; the client
/// is shared by reference.
///
/// # Example
///
/// ```no_run
/// use specsync::tracker::{TrackerClient, TrackerConfig};
///
/// # async fn demo() -> Result<(), specsync::tracker::TrackerError> {
/// let config = TrackerConfig::new("octo-org/app").with_token("ghp_example");
/// let client = TrackerClient::new(&config)?;
/// let issue = client
///     .create_issue("Build parser", "Details", &["spec:core".to_string()])
///     .await?;
/// client.close_issue(issue.number).await?;
/// # Ok(())
/// # }
/// ```
pub struct TrackerClient {
    repo: RepoSlug,
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    gate: RateLimitGate,
    probed: AtomicBool,
}

impl std::fmt::Debug for TrackerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerClient")
            .field("repo", &self.repo)
            .field("policy", &self.policy)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl TrackerClient {
    /// Build a client talking to the GitHub REST API over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the config is invalid or the HTTP
    /// client cannot be built. No request is made.
    pub fn new(config: &TrackerConfig) -> TrackerResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.api_url, &config.token)
            .map_err(|e| TrackerError::configuration(e.to_string()))?;
        Self::with_transport(config, transport, SystemClock)
    }

    /// Build a client over a custom transport and clock.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the config is invalid.
    pub fn with_transport(
        config: &TrackerConfig,
        transport: impl Transport + 'static,
        clock: impl Clock + 'static,
    ) -> TrackerResult<Self> {
        let repo = config.validate()?;
        Ok(Self {
            repo,
            transport: Box::new(transport),
            clock: Arc::new(clock),
            policy: config.retry_policy(),
            gate: RateLimitGate::new(config.rate_limit_buffer),
            probed: AtomicBool::new(false),
        })
    }

    /// Target repository.
    #[must_use]
    pub fn repository(&self) -> &RepoSlug {
        &self.repo
    }

    /// Retry policy in effect.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Last known quota.
    #[must_use]
    pub fn known_rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.gate.snapshot()
    }

    fn issues_path(&self) -> String {
        format!("{}/issues", self.repo.api_path())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Create an open issue.
    pub async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> TrackerResult<TrackerIssue> {
        let request = ApiRequest::post(
            self.issues_path(),
            json!({ "title": title, "body": body, "labels": labels }),
        );
        let issue = self.decode_issue(&self.execute(&request).await?)?;
        info!("Created issue #{} '{}'", issue.number, issue.title);
        Ok(issue)
    }

    /// Apply a partial update to an issue.
    pub async fn update_issue(
        &self,
        number: u64,
        update: &IssueUpdate,
    ) -> TrackerResult<TrackerIssue> {
        let body = serde_json::to_value(update)
            .map_err(|e| TrackerError::new(ErrorKind::BadRequest, e.to_string()))?;
        let request = ApiRequest::patch(format!("{}/{}", self.issues_path(), number), body);
        let issue = self.decode_issue(&self.execute(&request).await?)?;
        debug!("Updated issue #{}", issue.number);
        Ok(issue)
    }

    /// Fetch a single issue.
    pub async fn get_issue(&self, number: u64) -> TrackerResult<TrackerIssue> {
        let request = ApiRequest::get(format!("{}/{}", self.issues_path(), number));
        self.decode_issue(&self.execute(&request).await?)
    }

    /// Close an issue.
    pub async fn close_issue(&self, number: u64) -> TrackerResult<TrackerIssue> {
        self.update_issue(number, &IssueUpdate::new().with_state(IssueState::Closed))
            .await
    }

    /// Reopen an issue.
    pub async fn reopen_issue(&self, number: u64) -> TrackerResult<TrackerIssue> {
        self.update_issue(number, &IssueUpdate::new().with_state(IssueState::Open))
            .await
    }

    /// Most recently created issue carrying `label`, open or closed.
    pub async fn find_issue_by_label(&self, label: &str) -> TrackerResult<Option<TrackerIssue>> {
        let request = ApiRequest::get(self.issues_path())
            .with_query("labels", label)
            .with_query("state", "all")
            .with_query("sort", "created")
            .with_query("direction", "desc")
            .with_query("per_page", "1");
        let issues: Vec<IssuePayload> = decode(&self.execute(&request).await?, "issue list")?;
        Ok(issues.into_iter().next().map(TrackerIssue::from))
    }

    /// Check credentials, repository access and issue listing.
    ///
    /// Never fails; every problem found is folded into the report message.
    pub async fn test_connection(&self) -> ConnectionReport {
        let mut failures = Vec::new();
        let mut login = None;

        match self.execute(&ApiRequest::get("/user")).await {
            Ok(response) => {
                login = serde_json::from_str::<serde_json::Value>(&response.body)
                    .ok()
                    .and_then(|user| user.get("login")?.as_str().map(ToString::to_string));
            }
            Err(e) => failures.push(format!("credentials: {}", e)),
        }

        if let Err(e) = self.execute(&ApiRequest::get(self.repo.api_path())).await {
            failures.push(format!("repository {}: {}", self.repo, e));
        }

        let list = ApiRequest::get(self.issues_path()).with_query("per_page", "1");
        if let Err(e) = self.execute(&list).await {
            failures.push(format!("issue listing: {}", e));
        }

        if failures.is_empty() {
            ConnectionReport {
                success: true,
                message: format!(
                    "Connected to {} as {}",
                    self.repo,
                    login.as_deref().unwrap_or("unknown user")
                ),
            }
        } else {
            ConnectionReport {
                success: false,
                message: failures.join("; "),
            }
        }
    }

    /// Fetch the current quota from `GET /rate_limit`.
    ///
    /// Single attempt; the result also refreshes the gate.
    pub async fn rate_limit_status(&self) -> TrackerResult<RateLimitSnapshot> {
        let response = self
            .transport
            .send(&ApiRequest::get("/rate_limit"))
            .await
            .map_err(|e| TrackerError::transient(e.to_string()).with_attempts(1))?;
        if !response.is_success() {
            return Err(
                TrackerError::from_response(response.status, &response.body).with_attempts(1),
            );
        }
        let snapshot = RateLimitSnapshot::from_rate_limit_body(&response.body)
            .ok_or_else(|| TrackerError::invalid_response("unrecognised rate limit body"))?;
        self.gate.observe(snapshot);
        Ok(snapshot)
    }

    // ========================================================================
    // Executor
    // ========================================================================

    async fn ensure_quota_known(&self) {
        if self.probed.swap(true, Ordering::SeqCst) || self.gate.is_known() {
            return;
        }
        match self.rate_limit_status().await {
            Ok(snapshot) => debug!(
                "Rate limit: {}/{} remaining, resets at {}",
                snapshot.remaining, snapshot.limit, snapshot.reset_at
            ),
            Err(e) => warn!("Rate limit probe failed, quota unknown: {}", e),
        }
    }

    async fn wait_for_quota(&self) {
        if let Some(wait) = self.gate.required_wait(self.clock.now()) {
            info!(
                "Rate limit nearly exhausted, waiting {}s for reset",
                wait.as_secs()
            );
            self.clock.sleep(wait).await;
        }
    }

    /// When a 429 says the quota comes back.
    fn exhausted_until(&self, response: &ApiResponse) -> DateTime<Utc> {
        let now = self.clock.now();
        let after = |wait: std::time::Duration| {
            now + chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::zero())
        };
        if let Some(retry_after) = response.retry_after {
            return after(retry_after);
        }
        match response.rate_limit {
            Some(snapshot) if snapshot.reset_at > now => snapshot.reset_at,
            _ => after(self.policy.delay),
        }
    }

    async fn execute(&self, request: &ApiRequest) -> TrackerResult<ApiResponse> {
        self.ensure_quota_known().await;

        let mut attempt = 1;
        loop {
            self.wait_for_quota().await;
            debug!("{} (attempt {}/{})", request, attempt, self.policy.max_attempts);

            let error = match self.transport.send(request).await {
                Ok(response) => {
                    if let Some(snapshot) = response.rate_limit {
                        self.gate.observe(snapshot);
                    }
                    if response.is_success() {
                        return Ok(response);
                    }
                    let error = TrackerError::from_response(response.status, &response.body);
                    if error.kind() == ErrorKind::RateLimited {
                        self.gate.mark_exhausted(self.exhausted_until(&response));
                    }
                    error
                }
                Err(e) => TrackerError::transient(e.message),
            };

            if !error.is_retryable() || !self.policy.allows_retry(attempt) {
                return Err(error.with_attempts(attempt));
            }

            warn!(
                "{} failed (attempt {}/{}): {}",
                request, attempt, self.policy.max_attempts, error
            );
            // Rate-limited attempts wait in the gate instead
            if error.kind() != ErrorKind::RateLimited && !self.policy.delay.is_zero() {
                self.clock.sleep(self.policy.delay).await;
            }
            attempt += 1;
        }
    }

    fn decode_issue(&self, response: &ApiResponse) -> TrackerResult<TrackerIssue> {
        decode::<IssuePayload>(response, "issue").map(TrackerIssue::from)
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse, what: &str) -> TrackerResult<T> {
    serde_json::from_str(&response.body).map_err(|e| {
        TrackerError::invalid_response(format!("could not decode {}: {}", what, e))
    })
}
