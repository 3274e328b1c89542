//! Quota tracking for the tracker API.
//!
//! The gate remembers the most recent [`RateLimitSnapshot`] and tells the
//! executor how long to wait before the next call. Snapshots come from
//! response headers, from the `/rate_limit` endpoint, or from a 429 that
//! marks the quota exhausted.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Default number of calls kept in reserve before waiting for a reset.
pub const DEFAULT_RATE_LIMIT_BUFFER: u32 = 10;

/// Quota state reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSnapshot {
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the window resets
    pub reset_at: DateTime<Utc>,
}

impl RateLimitSnapshot {
    /// Build a snapshot from `x-ratelimit-limit`, `x-ratelimit-remaining`
    /// and `x-ratelimit-reset` header values.
    ///
    /// Returns `None` unless `remaining` and `reset` are present and
    /// numeric. A missing `limit` defaults to `remaining`.
    ///
    /// # Example
    ///
    /// ```
    /// use specsync::tracker::RateLimitSnapshot;
    ///
    /// let snapshot =
    ///     RateLimitSnapshot::from_header_values(Some("5000"), Some("4990"), Some("1700000000"))
    ///         .unwrap();
    /// assert_eq!(snapshot.remaining, 4990);
    /// assert_eq!(snapshot.reset_at.timestamp(), 1_700_000_000);
    /// ```
    #[must_use]
    pub fn from_header_values(
        limit: Option<&str>,
        remaining: Option<&str>,
        reset: Option<&str>,
    ) -> Option<Self> {
        let remaining: u32 = remaining?.trim().parse().ok()?;
        let reset: i64 = reset?.trim().parse().ok()?;
        let limit = limit
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(remaining);
        Some(Self {
            limit,
            remaining,
            reset_at: Utc.timestamp_opt(reset, 0).single()?,
        })
    }

    /// Parse the body of `GET /rate_limit`.
    ///
    /// Reads `resources.core`, falling back to the legacy top-level `rate`.
    #[must_use]
    pub fn from_rate_limit_body(body: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let core = value
            .pointer("/resources/core")
            .or_else(|| value.get("rate"))?;

        let field = |name: &str| core.get(name).and_then(serde_json::Value::as_u64);
        let remaining = u32::try_from(field("remaining")?).ok()?;
        let limit = field("limit")
            .and_then(|limit| u32::try_from(limit).ok())
            .unwrap_or(remaining);
        let reset = i64::try_from(field("reset")?).ok()?;

        Some(Self {
            limit,
            remaining,
            reset_at: Utc.timestamp_opt(reset, 0).single()?,
        })
    }
}

/// Synchronous backpressure on the tracker quota.
#[derive(Debug)]
pub struct RateLimitGate {
    buffer: u32,
    snapshot: Mutex<Option<RateLimitSnapshot>>,
}

impl RateLimitGate {
    /// Create a gate that keeps `buffer` requests in reserve.
    #[must_use]
    pub fn new(buffer: u32) -> Self {
        Self {
            buffer,
            snapshot: Mutex::new(None),
        }
    }

    /// Reserve size.
    #[must_use]
    pub fn buffer(&self) -> u32 {
        self.buffer
    }

    /// Last known quota, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<RateLimitSnapshot> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check whether any quota information has been observed.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Replace the known quota.
    pub fn observe(&self, snapshot: RateLimitSnapshot) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Mark the quota exhausted until `reset_at`.
    pub fn mark_exhausted(&self, reset_at: DateTime<Utc>) {
        let limit = self.snapshot().map_or(0, |snapshot| snapshot.limit);
        self.observe(RateLimitSnapshot {
            limit,
            remaining: 0,
            reset_at,
        });
    }

    /// How long to wait before the next call, or `None` to proceed now.
    ///
    /// A wait is required when the remaining quota is exhausted or below
    /// the buffer and the reset time is still in the future.
    #[must_use]
    pub fn required_wait(&self, now: DateTime<Utc>) -> Option<Duration> {
        let snapshot = self.snapshot()?;
        if snapshot.remaining > 0 && snapshot.remaining >= self.buffer {
            return None;
        }
        (snapshot.reset_at - now)
            .to_std()
            .ok()
            .filter(|wait| !wait.is_zero())
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(remaining: u32, reset_at: DateTime<Utc>) -> RateLimitSnapshot {
        RateLimitSnapshot {
            limit: 5000,
            remaining,
            reset_at,
        }
    }

    #[test]
    fn test_unknown_quota_never_waits() {
        let gate = RateLimitGate::new(10);
        assert!(!gate.is_known());
        assert_eq!(gate.required_wait(Utc::now()), None);
    }

    #[test]
    fn test_waits_when_below_buffer() {
        let now = Utc::now();
        let gate = RateLimitGate::new(10);
        gate.observe(snapshot(3, now + chrono::Duration::seconds(30)));
        assert_eq!(gate.required_wait(now), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_no_wait_with_enough_quota() {
        let now = Utc::now();
        let gate = RateLimitGate::new(10);
        gate.observe(snapshot(10, now + chrono::Duration::seconds(30)));
        assert_eq!(gate.required_wait(now), None);
    }

    #[test]
    fn test_no_wait_after_reset_passed() {
        let now = Utc::now();
        let gate = RateLimitGate::new(10);
        gate.observe(snapshot(0, now - chrono::Duration::seconds(1)));
        assert_eq!(gate.required_wait(now), None);
    }

    #[test]
    fn test_exhausted_waits_even_without_buffer() {
        let now = Utc::now();
        let gate = RateLimitGate::new(0);
        gate.mark_exhausted(now + chrono::Duration::seconds(5));
        assert_eq!(gate.required_wait(now), Some(Duration::from_secs(5)));
        assert_eq!(gate.snapshot().map(|s| s.remaining), Some(0));
    }

    #[test]
    fn test_header_values() {
        assert!(RateLimitSnapshot::from_header_values(None, Some("1"), None).is_none());
        assert!(RateLimitSnapshot::from_header_values(None, Some("x"), Some("1")).is_none());
        let parsed = RateLimitSnapshot::from_header_values(None, Some("7"), Some("60")).unwrap();
        assert_eq!(parsed.limit, 7);
    }

    #[test]
    fn test_rate_limit_body() {
        let body = r#"{"resources":{"core":{"limit":5000,"remaining":12,"reset":1700000000,"used":4988}}}"#;
        let parsed = RateLimitSnapshot::from_rate_limit_body(body).unwrap();
        assert_eq!(parsed.limit, 5000);
        assert_eq!(parsed.remaining, 12);

        let legacy = r#"{"rate":{"limit":60,"remaining":59,"reset":1700000000}}"#;
        assert_eq!(
            RateLimitSnapshot::from_rate_limit_body(legacy).map(|s| s.remaining),
            Some(59)
        );
        assert!(RateLimitSnapshot::from_rate_limit_body("{}").is_none());
    }
}
