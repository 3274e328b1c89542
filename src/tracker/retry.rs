//! Retry policy and the clock used for every tracker wait.
//!
//! Both retry delays and rate-limit waits go through [`Clock`], so tests can
//! drive the client with virtual time instead of sleeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

// ============================================================================
// Retry Policy
// ============================================================================

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default fixed delay between attempts in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Bounded retry with a fixed delay and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations allowed, including the first
    pub max_attempts: u32,
    /// Pause between invocations
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS)
    }
}

impl RetryPolicy {
    /// Build a policy from a retry count and a delay in milliseconds.
    ///
    /// # Example
    ///
    /// ```
    /// use specsync::tracker::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::from_settings(3, 250);
    /// assert_eq!(policy.max_attempts, 4);
    /// assert_eq!(policy.delay, Duration::from_millis(250));
    /// ```
    #[must_use]
    pub fn from_settings(max_retries: u32, retry_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            delay: Duration::from_millis(retry_delay_ms),
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Check whether another attempt is allowed after `attempt` invocations.
    #[must_use]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Source of time and sleeping for the tracker client.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by tokio's timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
