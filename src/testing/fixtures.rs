//! Temporary project layouts for sync tests.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project with a `.kiro/specs` tree.
///
/// Automatically cleans up when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestProject::new().with_spec("core", "- [ ] 1 Build parser");
/// let docs = discover_documents(fixture.path(), &fixture.specs_dir(), "tasks.md")?;
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl TestProject {
    /// Create an empty project with the default specs directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::create_dir_all(temp_dir.path().join(".kiro/specs"))
            .expect("Failed to create specs directory");
        Self { temp_dir }
    }

    /// Write `content` to `.kiro/specs/<group>/tasks.md`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn with_spec(self, group: &str, content: &str) -> Self {
        self.write_spec(group, content);
        self
    }

    /// Overwrite a spec document in place.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_spec(&self, group: &str, content: &str) {
        let dir = self.specs_dir().join(group);
        std::fs::create_dir_all(&dir).expect("Failed to create spec group directory");
        std::fs::write(dir.join("tasks.md"), content).expect("Failed to write tasks.md");
    }

    /// Delete a spec group.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be removed.
    pub fn remove_spec(&self, group: &str) {
        std::fs::remove_dir_all(self.specs_dir().join(group)).expect("Failed to remove spec");
    }

    /// Project root.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// `.kiro/specs` under the project root.
    #[must_use]
    pub fn specs_dir(&self) -> PathBuf {
        self.temp_dir.path().join(".kiro/specs")
    }

    /// Default ledger location.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.specs_dir().join(".sync-state.json")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
