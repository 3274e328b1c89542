//! Tracker connection settings and their fast-fail validation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::TrackerError;
use super::rate_limit::DEFAULT_RATE_LIMIT_BUFFER;
use super::retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS};
use super::transport::DEFAULT_API_URL;

/// Settings for [`TrackerClient`](super::TrackerClient).
///
/// Lives under the `tracker` key of `.specsync/settings.json`. The token is
/// never read from or written to that file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Bearer token; supplied by `--token` or `GITHUB_TOKEN`
    #[serde(skip)]
    pub token: String,
    /// Target repository as `owner/name`
    pub repository: String,
    /// REST API base URL
    pub api_url: String,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub retry_delay_ms: u64,
    /// Requests kept in reserve before waiting for a quota reset
    pub rate_limit_buffer: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            repository: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            rate_limit_buffer: DEFAULT_RATE_LIMIT_BUFFER,
        }
    }
}

impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("TrackerConfig")
            .field("token", &token)
            .field("repository", &self.repository)
            .field("api_url", &self.api_url)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("rate_limit_buffer", &self.rate_limit_buffer)
            .finish()
    }
}

impl TrackerConfig {
    /// Config for `repository` with default settings and no token.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    #[must_use]
    pub fn with_rate_limit_buffer(mut self, buffer: u32) -> Self {
        self.rate_limit_buffer = buffer;
        self
    }

    /// Retry policy described by this config.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_settings(self.max_retries, self.retry_delay_ms)
    }

    /// Check the settings needed before any request is made.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for a malformed repository, an empty
    /// token or a non-HTTP API URL.
    pub fn validate(&self) -> Result<RepoSlug, TrackerError> {
        let slug = RepoSlug::parse(&self.repository)?;
        if self.token.trim().is_empty() {
            return Err(TrackerError::configuration(
                "tracker token is empty (pass --token or set GITHUB_TOKEN)",
            ));
        }
        if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
            return Err(TrackerError::configuration(format!(
                "API URL '{}' must start with http:// or https://",
                self.api_url
            )));
        }
        Ok(slug)
    }
}

// ============================================================================
// Repository slug
// ============================================================================

/// A validated `owner/name` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    owner: String,
    name: String,
}

fn is_slug_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl RepoSlug {
    /// Parse `owner/name`.
    ///
    /// # Example
    ///
    /// ```
    /// use specsync::tracker::RepoSlug;
    ///
    /// let slug = RepoSlug::parse("octo-org/spec.sync").unwrap();
    /// assert_eq!(slug.owner(), "octo-org");
    /// assert!(RepoSlug::parse("octo-org").is_err());
    /// assert!(RepoSlug::parse("a/b/c").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error unless the value has exactly one
    /// `/` separating two non-empty parts made of `[A-Za-z0-9._-]`.
    pub fn parse(value: &str) -> Result<Self, TrackerError> {
        let invalid = || {
            TrackerError::configuration(format!(
                "repository '{}' must have the form owner/name",
                value
            ))
        };
        let (owner, name) = value.split_once('/').ok_or_else(invalid)?;
        if !is_slug_part(owner) || !is_slug_part(name) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `/repos/{owner}/{name}`
    #[must_use]
    pub fn api_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
