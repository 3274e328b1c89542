//! GitHub Issues client with rate-limit gating and typed retries.
//!
//! # Architecture
//!
//! ```text
//! TrackerClient::create_issue / update_issue / find_issue_by_label / ...
//!        │
//!        ▼
//!   execute(ApiRequest)
//!        │  1. probe GET /rate_limit once if quota unknown
//!        │  2. RateLimitGate::required_wait ──> Clock::sleep
//!        │  3. Transport::send
//!        │  4. classify ──> ErrorKind
//!        │  5. retry transient failures per RetryPolicy
//!        ▼
//!   HttpTransport (reqwest)  |  MockTransport / MockIssueTracker (tests)
//! ```
//!
//! Configuration is validated when the client is built; a malformed
//! repository or missing token never reaches the network.

mod client;
mod config;
mod error;
mod rate_limit;
mod retry;
mod transport;

pub use client::TrackerClient;
pub use config::{RepoSlug, TrackerConfig};
pub use error::{ErrorKind, TrackerError, TrackerResult};
pub use rate_limit::{RateLimitGate, RateLimitSnapshot, DEFAULT_RATE_LIMIT_BUFFER};
pub use retry::{Clock, RetryPolicy, SystemClock, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS};
pub use transport::{
    ApiRequest, ApiResponse, HttpMethod, HttpTransport, Transport, TransportError,
    DEFAULT_API_URL,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Issue model
// ============================================================================

/// Open/closed state of a tracker issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    /// State an issue should have for a task with the given completion.
    #[must_use]
    pub fn for_completion(completed: bool) -> Self {
        if completed {
            Self::Closed
        } else {
            Self::Open
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An issue as returned by the tracker.
///
/// Never cached beyond the call that returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: IssueState,
    pub labels: Vec<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackerIssue {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == IssueState::Closed
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Label as GitHub returns it: an object with a name, or a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelPayload {
    Named { name: String },
    Plain(String),
}

/// Wire shape of an issue in GitHub responses.
#[derive(Deserialize)]
struct IssuePayload {
    id: u64,
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: IssueState,
    #[serde(default)]
    labels: Vec<LabelPayload>,
    #[serde(default)]
    html_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<IssuePayload> for TrackerIssue {
    fn from(payload: IssuePayload) -> Self {
        Self {
            id: payload.id,
            number: payload.number,
            title: payload.title,
            body: payload.body,
            state: payload.state,
            labels: payload
                .labels
                .into_iter()
                .map(|label| match label {
                    LabelPayload::Named { name } => name,
                    LabelPayload::Plain(name) => name,
                })
                .collect(),
            url: payload.html_url,
            created_at: payload.created_at,
            updated_at: payload.updated_at,
        }
    }
}

/// Partial update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
}

impl IssueUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: IssueState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.state.is_none()
    }
}

/// Outcome of [`TrackerClient::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_payload_conversion() {
        let json = r#"{
            "id": 99, "number": 7, "title": "Build", "body": null, "state": "closed",
            "labels": [{"name": "spec:core", "color": "fff"}, "task:core/1"],
            "html_url": "https://github.com/o/r/issues/7",
            "created_at": "2026-01-01T00:00:00Z", "updated_at": "2026-01-02T00:00:00Z"
        }"#;
        let issue: TrackerIssue = serde_json::from_str::<IssuePayload>(json).unwrap().into();
        assert_eq!(issue.number, 7);
        assert!(issue.is_closed());
        assert!(issue.has_label("task:core/1"));
        assert!(issue.has_label("spec:core"));
        assert_eq!(issue.body, None);
    }

    #[test]
    fn test_update_serialization_skips_unset() {
        let update = IssueUpdate::new().with_state(IssueState::Closed);
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"state": "closed"})
        );
        assert!(IssueUpdate::new().is_empty());
    }

    #[test]
    fn test_state_for_completion() {
        assert_eq!(IssueState::for_completion(true), IssueState::Closed);
        assert_eq!(IssueState::for_completion(false), IssueState::Open);
    }
}
