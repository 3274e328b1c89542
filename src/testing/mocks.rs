//! Test doubles for the tracker seams.
//!
//! - [`MockTransport`]: plays back a script of responses in order.
//! - [`MockIssueTracker`]: a small in-memory GitHub Issues API.
//! - [`MockClock`]: virtual time that records every sleep.
//!
//! All three are cheap to clone and share their state between clones, so a
//! test can hand one clone to the client and keep another for assertions.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::task::MAX_LABEL_LEN;
use crate::tracker::{
    ApiRequest, ApiResponse, Clock, HttpMethod, IssueState, RateLimitSnapshot, TrackerIssue,
    Transport, TransportError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed starting instant for virtual time.
fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn rate_limit_body(snapshot: &RateLimitSnapshot) -> String {
    json!({
        "resources": {
            "core": {
                "limit": snapshot.limit,
                "remaining": snapshot.remaining,
                "reset": snapshot.reset_at.timestamp(),
            }
        }
    })
    .to_string()
}

fn generous_quota() -> ApiResponse {
    ApiResponse::new(
        200,
        rate_limit_body(&RateLimitSnapshot {
            limit: 5000,
            remaining: 5000,
            reset_at: epoch() + chrono::Duration::hours(1),
        }),
    )
}

fn is_rate_limit_probe(request: &ApiRequest) -> bool {
    request.method == HttpMethod::Get && request.path == "/rate_limit"
}

// ============================================================================
// Mock Transport
// ============================================================================

#[derive(Debug)]
struct TransportState {
    script: VecDeque<Result<ApiResponse, TransportError>>,
    probe: Result<ApiResponse, TransportError>,
    requests: Vec<ApiRequest>,
    probes: usize,
}

/// Transport that returns scripted responses in order.
///
/// `GET /rate_limit` probes are answered separately (a generous quota by
/// default) and are not counted as invocations. Once the script runs out
/// every call fails with a transport error.
///
/// # Example
///
/// ```rust,ignore
/// let transport = MockTransport::new()
///     .with_response(ApiResponse::new(500, ""))
///     .with_response(ApiResponse::new(200, "[]"));
/// // ... drive a TrackerClient ...
/// assert_eq!(transport.invocation_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState {
                script: VecDeque::new(),
                probe: Ok(generous_quota()),
                requests: Vec::new(),
                probes: 0,
            })),
        }
    }
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response to the script.
    #[must_use]
    pub fn with_response(self, response: ApiResponse) -> Self {
        lock(&self.state).script.push_back(Ok(response));
        self
    }

    /// Append a network-level failure to the script.
    #[must_use]
    pub fn with_transport_error(self, message: &str) -> Self {
        lock(&self.state)
            .script
            .push_back(Err(TransportError::new(message)));
        self
    }

    /// Answer rate-limit probes with `snapshot`.
    #[must_use]
    pub fn with_rate_limit(self, snapshot: RateLimitSnapshot) -> Self {
        lock(&self.state).probe = Ok(ApiResponse::new(200, rate_limit_body(&snapshot)));
        self
    }

    /// Answer rate-limit probes with a non-success response.
    #[must_use]
    pub fn with_rate_limit_failure(self, response: ApiResponse) -> Self {
        lock(&self.state).probe = Ok(response);
        self
    }

    /// Requests sent, excluding rate-limit probes.
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.state).requests.clone()
    }

    /// Number of requests sent, excluding rate-limit probes.
    pub fn invocation_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    /// Number of rate-limit probes.
    pub fn probe_count(&self) -> usize {
        lock(&self.state).probes
    }

    /// All calls, probes included.
    pub fn total_calls(&self) -> usize {
        let state = lock(&self.state);
        state.requests.len() + state.probes
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = lock(&self.state);
        if is_rate_limit_probe(request) {
            state.probes += 1;
            return state.probe.clone();
        }
        state.requests.push(request.clone());
        state
            .script
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("mock transport script exhausted")))
    }
}

// ============================================================================
// Mock Issue Tracker
// ============================================================================

#[derive(Debug, Clone)]
struct StoredIssue {
    number: u64,
    title: String,
    body: Option<String>,
    state: IssueState,
    labels: Vec<String>,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    method: HttpMethod,
    path_fragment: String,
    response: ApiResponse,
    remaining: usize,
}

#[derive(Debug)]
struct TrackerState {
    repository: String,
    issues: BTreeMap<u64, StoredIssue>,
    next_number: u64,
    requests: Vec<ApiRequest>,
    failures: Vec<InjectedFailure>,
}

/// In-memory stand-in for the GitHub Issues API of one repository.
///
/// Supports `/user`, `/repos/{o}/{r}`, listing issues by label, creating
/// issues, patching issues and `/rate_limit`. Failures can be injected per
/// method and path fragment.
#[derive(Debug, Clone)]
pub struct MockIssueTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl MockIssueTracker {
    /// Tracker serving `repository` (`owner/name`). Other repositories 404.
    #[must_use]
    pub fn new(repository: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                repository: repository.to_string(),
                issues: BTreeMap::new(),
                next_number: 1,
                requests: Vec::new(),
                failures: Vec::new(),
            })),
        }
    }

    /// Insert an existing issue and return its number.
    pub fn seed_issue(&self, title: &str, labels: &[&str], state: IssueState) -> u64 {
        let mut tracker = lock(&self.state);
        let number = tracker.next_number;
        tracker.next_number += 1;
        tracker.issues.insert(
            number,
            StoredIssue {
                number,
                title: title.to_string(),
                body: None,
                state,
                labels: labels.iter().map(|l| l.to_string()).collect(),
            },
        );
        number
    }

    /// Answer the next `times` matching requests with `status`.
    ///
    /// A request matches when its method equals `method` and its path
    /// contains `path_fragment`.
    pub fn fail_next(&self, method: HttpMethod, path_fragment: &str, status: u16, times: usize) {
        lock(&self.state).failures.push(InjectedFailure {
            method,
            path_fragment: path_fragment.to_string(),
            response: ApiResponse::new(status, json!({"message": "injected failure"}).to_string()),
            remaining: times,
        });
    }

    /// Issue by number.
    pub fn issue(&self, number: u64) -> Option<TrackerIssue> {
        lock(&self.state).issues.get(&number).map(to_issue)
    }

    /// Every stored issue, by number.
    pub fn issues(&self) -> Vec<TrackerIssue> {
        lock(&self.state).issues.values().map(to_issue).collect()
    }

    /// Requests received, excluding rate-limit probes.
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.state).requests.clone()
    }

    /// Number of POST and PATCH requests received.
    pub fn mutation_count(&self) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.method != HttpMethod::Get)
            .count()
    }
}

fn to_issue(stored: &StoredIssue) -> TrackerIssue {
    TrackerIssue {
        id: stored.number + 1000,
        number: stored.number,
        title: stored.title.clone(),
        body: stored.body.clone(),
        state: stored.state,
        labels: stored.labels.clone(),
        url: format!("https://github.com/mock/issues/{}", stored.number),
        created_at: epoch(),
        updated_at: epoch(),
    }
}

fn issue_json(stored: &StoredIssue) -> Value {
    let labels: Vec<Value> = stored.labels.iter().map(|name| json!({ "name": name })).collect();
    json!({
        "id": stored.number + 1000,
        "number": stored.number,
        "title": stored.title,
        "body": stored.body,
        "state": stored.state.as_str(),
        "labels": labels,
        "html_url": format!("https://github.com/mock/issues/{}", stored.number),
        "created_at": epoch().to_rfc3339(),
        "updated_at": epoch().to_rfc3339(),
    })
}

fn not_found() -> ApiResponse {
    ApiResponse::new(404, json!({"message": "Not Found"}).to_string())
}

/// Number from `<issues_path>/<number>`.
fn issue_number(path: &str, issues_path: &str) -> Option<u64> {
    path.strip_prefix(issues_path)?
        .strip_prefix('/')?
        .parse()
        .ok()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl TrackerState {
    fn take_failure(&mut self, request: &ApiRequest) -> Option<ApiResponse> {
        let failure = self.failures.iter_mut().find(|f| {
            f.remaining > 0 && f.method == request.method && request.path.contains(&f.path_fragment)
        })?;
        failure.remaining -= 1;
        Some(failure.response.clone())
    }

    fn route(&mut self, request: &ApiRequest) -> ApiResponse {
        let repo_path = format!("/repos/{}", self.repository);
        let issues_path = format!("{}/issues", repo_path);
        let body = request.body.clone().unwrap_or(Value::Null);

        match request.method {
            HttpMethod::Get if request.path == "/user" => {
                ApiResponse::new(200, json!({"login": "mock-user"}).to_string())
            }
            HttpMethod::Get if request.path == repo_path => {
                ApiResponse::new(200, json!({"full_name": self.repository}).to_string())
            }
            HttpMethod::Get if request.path == issues_path => {
                let per_page = request
                    .query_value("per_page")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30);
                let label = request.query_value("labels");
                let matches: Vec<Value> = self
                    .issues
                    .values()
                    .rev()
                    .filter(|issue| label.is_none_or(|l| issue.labels.iter().any(|x| x == l)))
                    .take(per_page)
                    .map(issue_json)
                    .collect();
                ApiResponse::new(200, Value::Array(matches).to_string())
            }
            HttpMethod::Post if request.path == issues_path => {
                let Some(title) = body.get("title").and_then(Value::as_str) else {
                    return ApiResponse::new(422, json!({"message": "title missing"}).to_string());
                };
                let labels = string_list(body.get("labels"));
                if labels.iter().any(|l| l.chars().count() > MAX_LABEL_LEN) {
                    let message = json!({"message": "label name too long"});
                    return ApiResponse::new(422, message.to_string());
                }
                let number = self.next_number;
                self.next_number += 1;
                let issue = StoredIssue {
                    number,
                    title: title.to_string(),
                    body: body.get("body").and_then(Value::as_str).map(ToString::to_string),
                    state: IssueState::Open,
                    labels,
                };
                let response = ApiResponse::new(201, issue_json(&issue).to_string());
                self.issues.insert(number, issue);
                response
            }
            HttpMethod::Get => {
                let Some(issue) = issue_number(&request.path, &issues_path)
                    .and_then(|number| self.issues.get(&number))
                else {
                    return not_found();
                };
                ApiResponse::new(200, issue_json(issue).to_string())
            }
            HttpMethod::Patch => {
                let Some(number) = issue_number(&request.path, &issues_path) else {
                    return not_found();
                };
                let Some(issue) = self.issues.get_mut(&number) else {
                    return not_found();
                };
                if let Some(title) = body.get("title").and_then(Value::as_str) {
                    issue.title = title.to_string();
                }
                if let Some(text) = body.get("body").and_then(Value::as_str) {
                    issue.body = Some(text.to_string());
                }
                match body.get("state").and_then(Value::as_str) {
                    Some("closed") => issue.state = IssueState::Closed,
                    Some("open") => issue.state = IssueState::Open,
                    _ => {}
                }
                ApiResponse::new(200, issue_json(issue).to_string())
            }
            _ => not_found(),
        }
    }
}

#[async_trait]
impl Transport for MockIssueTracker {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = lock(&self.state);
        if is_rate_limit_probe(request) {
            return Ok(generous_quota());
        }
        state.requests.push(request.clone());
        if let Some(response) = state.take_failure(request) {
            return Ok(response);
        }
        Ok(state.route(request))
    }
}

// ============================================================================
// Mock Clock
// ============================================================================

#[derive(Debug)]
struct ClockState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

/// Virtual clock: `sleep` returns immediately and advances `now`.
#[derive(Debug, Clone)]
pub struct MockClock {
    state: Arc<Mutex<ClockState>>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::at(epoch())
    }
}

impl MockClock {
    /// Clock starting at 2026-01-01T00:00:00Z.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `now`.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                now,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Every requested sleep, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.state).sleeps.clone()
    }

    /// Sum of all sleeps.
    pub fn total_slept(&self) -> Duration {
        lock(&self.state).sleeps.iter().sum()
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut state = lock(&self.state);
        let step = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        state.now += step;
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        lock(&self.state).now
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        lock(&self.state).sleeps.push(duration);
    }
}
