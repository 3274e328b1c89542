//! Configuration validation for specsync.
//!
//! Checks the settings file for JSON syntax, then checks the loaded values:
//! repository slug, API URL, retry and rate-limit numbers, the task file
//! glob and whether the specs directory exists.
//!
//! # Example
//!
//! ```rust,ignore
//! use specsync::config::ConfigValidator;
//! use std::path::Path;
//!
//! let report = ConfigValidator::new(Path::new("/path/to/project")).validate();
//! if !report.is_valid() {
//!     for error in &report.errors {
//!         eprintln!("Error: {}", error);
//!     }
//!     std::process::exit(report.exit_code());
//! }
//! ```

use globset::Glob;
use std::path::{Path, PathBuf};

use super::SyncConfig;
use crate::task::MAX_LABEL_LEN;
use crate::tracker::RepoSlug;

/// Upper bound above which a retry count is almost certainly a typo.
const MAX_SENSIBLE_RETRIES: u32 = 10;

/// Findings from checking a project's settings.
///
/// # Example
///
/// ```
/// use specsync::config::ValidationReport;
///
/// let report = ValidationReport::new();
/// assert!(report.is_valid());
/// assert_eq!(report.exit_code(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Problems that stop a sync from running
    pub errors: Vec<String>,
    /// Suspicious values a sync can still run with
    pub warnings: Vec<String>,
    /// Settings files that were read
    pub files_checked: Vec<PathBuf>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Warnings alone keep the settings usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Exit code for `config validate`: 0, or 2 for unusable settings.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            2
        }
    }

    /// One-line verdict, e.g. `settings OK (1 warning(s))`.
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.errors.len(), self.warnings.len()) {
            (0, 0) => "settings OK".to_string(),
            (0, warnings) => format!("settings OK ({} warning(s))", warnings),
            (errors, _) => format!("settings invalid: {} error(s)", errors),
        }
    }

    /// Every finding, one per line, followed by the verdict.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out: Vec<String> = self
            .files_checked
            .iter()
            .map(|file| format!("checked {}", file.display()))
            .collect();
        out.extend(self.errors.iter().map(|e| format!("error: {}", e)));
        out.extend(self.warnings.iter().map(|w| format!("warning: {}", w)));
        out.push(self.summary());
        out.join("\n")
    }
}

/// Validates the settings of one project directory.
#[derive(Debug, Clone)]
pub struct ConfigValidator {
    project_dir: PathBuf,
}

impl ConfigValidator {
    #[must_use]
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
        }
    }

    /// Validate the settings file and the values it produces.
    ///
    /// Never fails: unreadable or malformed files are reported as errors.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        let settings_path = SyncConfig::settings_path(&self.project_dir);
        report.files_checked.push(settings_path.clone());

        let config = if settings_path.exists() {
            let content = match std::fs::read_to_string(&settings_path) {
                Ok(content) => content,
                Err(e) => {
                    report
                        .errors
                        .push(format!("Cannot read settings.json: {}", e));
                    return report;
                }
            };
            match serde_json::from_str::<SyncConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    report.errors.push(format!(
                        "settings.json syntax error: {} (parse failed at line {}, column {})",
                        e,
                        e.line(),
                        e.column()
                    ));
                    return report;
                }
            }
        } else {
            report.warnings.push(format!(
                "{} not found, using defaults",
                settings_path.display()
            ));
            SyncConfig::default()
        };

        config.check_into(&self.project_dir, &mut report);
        report
    }
}

impl SyncConfig {
    /// Check loaded values and add problems to `report`.
    ///
    /// The token is not checked here; it never comes from the settings file.
    pub fn validate(&self, project_dir: &Path) -> ValidationReport {
        let mut report = ValidationReport::new();
        self.check_into(project_dir, &mut report);
        report
    }

    fn check_into(&self, project_dir: &Path, report: &mut ValidationReport) {
        let tracker = &self.tracker;

        if tracker.repository.trim().is_empty() {
            report
                .warnings
                .push("tracker.repository is not set (pass --repository to sync)".to_string());
        } else if let Err(e) = RepoSlug::parse(&tracker.repository) {
            report.errors.push(format!("tracker.repository: {}", e.message()));
        }

        if !(tracker.api_url.starts_with("https://") || tracker.api_url.starts_with("http://")) {
            report.errors.push(format!(
                "tracker.apiUrl '{}' must start with http:// or https://",
                tracker.api_url
            ));
        } else if tracker.api_url.starts_with("http://") {
            report
                .warnings
                .push("tracker.apiUrl uses plain http; the token is sent unencrypted".to_string());
        }

        if tracker.max_retries > MAX_SENSIBLE_RETRIES {
            report.warnings.push(format!(
                "tracker.maxRetries is {}, more than {}",
                tracker.max_retries, MAX_SENSIBLE_RETRIES
            ));
        }
        if tracker.retry_delay_ms == 0 && tracker.max_retries > 0 {
            report
                .warnings
                .push("tracker.retryDelayMs is 0; retries will not back off".to_string());
        }

        if self.task_file.trim().is_empty() {
            report.errors.push("taskFile must not be empty".to_string());
        } else if let Err(e) = Glob::new(&self.task_file) {
            report.errors.push(format!("taskFile: {}", e));
        }

        for label in &self.labels {
            if label.trim().is_empty() {
                report.errors.push("labels must not contain empty names".to_string());
            } else if label.chars().count() > MAX_LABEL_LEN {
                report.errors.push(format!(
                    "label '{}' is longer than {} characters",
                    label, MAX_LABEL_LEN
                ));
            } else if label.starts_with("task:") || label.starts_with("spec:") {
                report.warnings.push(format!(
                    "label '{}' uses a prefix reserved for generated labels",
                    label
                ));
            }
        }

        let specs_dir = self.specs_dir(project_dir);
        if !specs_dir.is_dir() {
            report.warnings.push(format!(
                "specs directory {} does not exist",
                specs_dir.display()
            ));
        }
    }
}
