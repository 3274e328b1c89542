//! Configuration management for specsync.
//!
//! Settings live in `.specsync/settings.json` under the project directory.
//! Every field has a default, so a project with no settings file works as
//! long as the repository and token are supplied on the command line.
//!
//! ```json
//! {
//!   "specsDir": ".kiro/specs",
//!   "taskFile": "tasks.md",
//!   "labels": ["spec-task"],
//!   "tracker": { "repository": "acme/app", "maxRetries": 3 }
//! }
//! ```

pub mod validation;

pub use validation::{ConfigValidator, ValidationReport};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::reconcile::ReconcileOptions;
use crate::state::SyncStateManager;
use crate::tracker::TrackerConfig;

/// Default location of spec documents, relative to the project.
pub const DEFAULT_SPECS_DIR: &str = ".kiro/specs";

/// Default checklist file name.
pub const DEFAULT_TASK_FILE: &str = "tasks.md";

/// Project configuration loaded from `.specsync/settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Root of the spec tree, relative to the project unless absolute
    pub specs_dir: PathBuf,

    /// File name (or glob) of checklist documents
    pub task_file: String,

    /// Ledger file; defaults to `.sync-state.json` inside the specs dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,

    /// Labels added to every created issue
    pub labels: Vec<String>,

    /// Text inserted into every issue body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_context: Option<String>,

    pub tracker: TrackerConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from(DEFAULT_SPECS_DIR),
            task_file: DEFAULT_TASK_FILE.to_string(),
            ledger_path: None,
            labels: Vec::new(),
            extra_context: None,
            tracker: TrackerConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a project directory
    ///
    /// # Errors
    ///
    /// Fails if the settings file exists but cannot be read or parsed.
    pub fn load(project_dir: &Path) -> anyhow::Result<Self> {
        let settings_path = Self::settings_path(project_dir);

        if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            let config: SyncConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", settings_path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the settings.json path for a project
    pub fn settings_path(project_dir: &Path) -> PathBuf {
        project_dir.join(".specsync/settings.json")
    }

    /// Resolved specs directory
    pub fn specs_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.specs_dir)
    }

    /// Resolved ledger path
    pub fn ledger_path(&self, project_dir: &Path) -> PathBuf {
        match &self.ledger_path {
            Some(path) => project_dir.join(path),
            None => SyncStateManager::default_path(&self.specs_dir(project_dir)),
        }
    }

    /// Apply command-line values on top of the file settings.
    #[must_use]
    pub fn with_overrides(mut self, repository: Option<String>, token: Option<String>) -> Self {
        if let Some(repository) = repository.filter(|r| !r.trim().is_empty()) {
            self.tracker.repository = repository;
        }
        if let Some(token) = token {
            self.tracker.token = token;
        }
        self
    }

    /// Reconciliation options described by this config.
    #[must_use]
    pub fn reconcile_options(&self, dry_run: bool) -> ReconcileOptions {
        ReconcileOptions {
            dry_run,
            labels: self.labels.clone(),
            extra_context: self.extra_context.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.specs_dir, PathBuf::from(".kiro/specs"));
        assert_eq!(config.task_file, "tasks.md");
        assert!(config.labels.is_empty());
        assert_eq!(config.tracker.max_retries, 3);
    }

    #[test]
    fn test_sync_config_load_missing() {
        let temp = TempDir::new().unwrap();
        let config = SyncConfig::load(temp.path()).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_sync_config_load_partial() {
        let temp = TempDir::new().unwrap();
        let path = SyncConfig::settings_path(temp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"specsDir": "docs/specs", "labels": ["spec-task"], "tracker": {"repository": "acme/app", "retryDelayMs": 250, "token": "ignored"}}"#,
        )
        .unwrap();

        let config = SyncConfig::load(temp.path()).unwrap();
        assert_eq!(config.specs_dir, PathBuf::from("docs/specs"));
        assert_eq!(config.task_file, "tasks.md");
        assert_eq!(config.labels, vec!["spec-task".to_string()]);
        assert_eq!(config.tracker.repository, "acme/app");
        assert_eq!(config.tracker.retry_delay_ms, 250);
        assert_eq!(config.tracker.max_retries, 3);
        assert!(config.tracker.token.is_empty());
    }

    #[test]
    fn test_sync_config_load_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = SyncConfig::settings_path(temp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{").unwrap();

        let err = SyncConfig::load(temp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn test_paths() {
        let project = Path::new("/work/app");
        let mut config = SyncConfig::default();
        assert_eq!(
            config.ledger_path(project),
            PathBuf::from("/work/app/.kiro/specs/.sync-state.json")
        );
        config.ledger_path = Some(PathBuf::from("state/ledger.json"));
        assert_eq!(
            config.ledger_path(project),
            PathBuf::from("/work/app/state/ledger.json")
        );
        assert_eq!(
            SyncConfig::settings_path(project),
            PathBuf::from("/work/app/.specsync/settings.json")
        );
    }

    #[test]
    fn test_overrides() {
        let config = SyncConfig::default().with_overrides(Some("acme/app".into()), Some("t0k".into()));
        assert_eq!(config.tracker.repository, "acme/app");
        assert_eq!(config.tracker.token, "t0k");

        let kept = config.clone().with_overrides(Some("  ".into()), None);
        assert_eq!(kept.tracker.repository, "acme/app");
        assert_eq!(kept.tracker.token, "t0k");
    }

    #[test]
    fn test_serialization_never_writes_token() {
        let config = SyncConfig::default().with_overrides(None, Some("secret".into()));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"specsDir\""));
    }
}
