//! Tracker error classification.
//!
//! Every failure coming out of the tracker client is a [`TrackerError`]
//! carrying an [`ErrorKind`]. The kind decides whether the executor retries:
//!
//! | Source                    | Kind              | Retried |
//! |---------------------------|-------------------|---------|
//! | 5xx, network failure      | `Transient`       | yes     |
//! | 429                       | `RateLimited`     | yes     |
//! | 400                       | `BadRequest`      | no      |
//! | 401                       | `Authentication`  | no      |
//! | 403                       | `Forbidden`       | no      |
//! | 404                       | `NotFound`        | no      |
//! | 409                       | `Conflict`        | no      |
//! | 422                       | `Validation`      | no      |
//! | bad config at construction| `Configuration`   | no      |
//! | unparseable success body  | `InvalidResponse` | no      |

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Maximum number of body characters kept in an error message.
const MAX_BODY_CHARS: usize = 200;

/// Category of a tracker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Client configuration rejected before any request
    Configuration,
    /// 401: missing or invalid credentials
    Authentication,
    /// 403: credentials lack permission
    Forbidden,
    /// 404: repository or issue does not exist
    NotFound,
    /// 409: conflicting state on the tracker
    Conflict,
    /// 422: payload rejected by the tracker
    Validation,
    /// 400 and other unclassified 4xx
    BadRequest,
    /// 429: quota exhausted
    RateLimited,
    /// 5xx or transport failure
    Transient,
    /// Success status with a body that could not be decoded
    InvalidResponse,
}

impl ErrorKind {
    /// Classify an HTTP status code. Returns `None` for success codes.
    ///
    /// # Example
    ///
    /// ```
    /// use specsync::tracker::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::from_status(503), Some(ErrorKind::Transient));
    /// assert_eq!(ErrorKind::from_status(422), Some(ErrorKind::Validation));
    /// assert_eq!(ErrorKind::from_status(201), None);
    /// ```
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=399 => None,
            400 => Some(Self::BadRequest),
            401 => Some(Self::Authentication),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            409 => Some(Self::Conflict),
            422 => Some(Self::Validation),
            429 => Some(Self::RateLimited),
            500..=599 => Some(Self::Transient),
            _ => Some(Self::BadRequest),
        }
    }

    /// Check if failures of this kind are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }

    /// Human-readable description of this kind.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration error",
            Self::Authentication => "authentication failed",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Validation => "validation failed",
            Self::BadRequest => "bad request",
            Self::RateLimited => "rate limited",
            Self::Transient => "transient failure",
            Self::InvalidResponse => "invalid response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A classified tracker failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Tracker {kind}: {message}")]
pub struct TrackerError {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
    attempts: u32,
}

impl TrackerError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            attempts: 0,
        }
    }

    /// Invalid client configuration.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Network-level or otherwise transient failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Success response that could not be decoded.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    /// Build an error from a non-success HTTP response.
    ///
    /// GitHub error bodies carry a `message` field; when present it is used
    /// instead of the raw body.
    ///
    /// # Example
    ///
    /// ```
    /// use specsync::tracker::{ErrorKind, TrackerError};
    ///
    /// let err = TrackerError::from_response(404, r#"{"message":"Not Found"}"#);
    /// assert_eq!(err.kind(), ErrorKind::NotFound);
    /// assert_eq!(err.status(), Some(404));
    /// assert_eq!(err.to_string(), "Tracker not found: HTTP 404: Not Found");
    /// ```
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let kind = ErrorKind::from_status(status).unwrap_or(ErrorKind::InvalidResponse);
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| value.get("message")?.as_str().map(ToString::to_string))
            .unwrap_or_else(|| body.chars().take(MAX_BODY_CHARS).collect());

        Self {
            kind,
            status: Some(status),
            message: format!("HTTP {}: {}", status, detail.trim()),
            attempts: 0,
        }
    }

    /// Record how many invocations were made before giving up.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status, if the failure came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Detail message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of invocations made before the error surfaced (0 if none).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Check if the executor should retry this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Result alias for tracker operations.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        let cases = [
            (400, ErrorKind::BadRequest),
            (401, ErrorKind::Authentication),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (409, ErrorKind::Conflict),
            (422, ErrorKind::Validation),
            (410, ErrorKind::BadRequest),
        ];
        for (status, kind) in cases {
            let err = TrackerError::from_response(status, "");
            assert_eq!(err.kind(), kind, "status {}", status);
            assert!(!err.is_retryable(), "status {}", status);
        }
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 502, 503, 599] {
            assert!(TrackerError::from_response(status, "").is_retryable());
        }
        assert!(TrackerError::transient("connection reset").is_retryable());
        assert!(!TrackerError::configuration("bad repo").is_retryable());
    }

    #[test]
    fn test_message_falls_back_to_truncated_body() {
        let body = "x".repeat(500);
        let err = TrackerError::from_response(502, &body);
        assert_eq!(err.message().len(), "HTTP 502: ".len() + MAX_BODY_CHARS);
    }

    #[test]
    fn test_with_attempts() {
        let err = TrackerError::transient("boom").with_attempts(4);
        assert_eq!(err.attempts(), 4);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_display() {
        let err = TrackerError::from_response(422, r#"{"message":"Validation Failed"}"#);
        assert_eq!(
            err.to_string(),
            "Tracker validation failed: HTTP 422: Validation Failed"
        );
    }
}
