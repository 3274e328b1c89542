//! Integration tests for the specsync CLI
//!
//! Only offline commands are exercised; anything that would reach GitHub is
//! tested for its fast-fail configuration checks.

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the specsync binary
fn specsync() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("specsync"));
    cmd.env_remove("GITHUB_TOKEN");
    cmd
}

/// Project with one spec group
fn project_with_tasks(content: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let group = temp.path().join(".kiro/specs/core");
    std::fs::create_dir_all(&group).unwrap();
    std::fs::write(group.join("tasks.md"), content).unwrap();
    temp
}

fn write_settings(project: &Path, json: &str) {
    let dir = project.join(".specsync");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("settings.json"), json).unwrap();
}

fn write_ledger(project: &Path) {
    std::fs::write(
        project.join(".kiro/specs/.sync-state.json"),
        r#"[{
            "taskId": "core/1",
            "trackerIssueNumber": 7,
            "lastSyncedAt": "2026-01-01T00:00:00Z",
            "lastContentHash": "stale",
            "filePath": ".kiro/specs/core/tasks.md"
        }]"#,
    )
    .unwrap();
}

#[test]
fn test_help() {
    specsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mirror checklist tasks"));
}

#[test]
fn test_version() {
    specsync()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_missing_project_dir() {
    specsync()
        .arg("--project")
        .arg("/nonexistent/specsync-project")
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Project directory does not exist"));
}

#[test]
fn test_validate_clean_documents() {
    let temp = project_with_tasks("# Tasks\n\n- [ ] 1 Set up\n- [x] 2 Ship\n");

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 document(s) valid"));
}

#[test]
fn test_validate_reports_errors() {
    let temp = project_with_tasks("- [ ] 1 First\n- [ ] 1 Again\n");

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("validate")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("duplicate id"))
        .stderr(predicate::str::contains("1 document(s) failed validation"));
}

#[test]
fn test_missing_specs_dir() {
    let temp = TempDir::new().unwrap();

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("validate")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("specs directory does not exist"));
}

#[test]
fn test_status_text() {
    let temp = project_with_tasks("- [ ] 1 Set up\n- [ ] 2 Ship\n");

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("core/1"))
        .stdout(predicate::str::contains("2 task(s), 2 pending"));
}

#[test]
fn test_status_json_with_ledger() {
    let temp = project_with_tasks("- [ ] 2 Ship\n");
    write_ledger(temp.path());

    let output = specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("status")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["entries"][0]["key"], "core/2");
    assert_eq!(status["entries"][0]["needsSync"], true);
    assert_eq!(status["orphans"][0], "core/1");
}

#[test]
fn test_export_then_import() {
    let source = project_with_tasks("- [ ] 1 Set up\n");
    write_ledger(source.path());
    let export = source.path().join("ledger-export.json");

    specsync()
        .arg("--project")
        .arg(source.path())
        .arg("export")
        .arg("--output")
        .arg(&export)
        .assert()
        .success()
        .stderr(predicate::str::contains("Exported 1 record(s)"));

    let target = project_with_tasks("- [ ] 1 Set up\n");
    specsync()
        .arg("--project")
        .arg(target.path())
        .arg("import")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 record(s)"));

    let ledger =
        std::fs::read_to_string(target.path().join(".kiro/specs/.sync-state.json")).unwrap();
    assert!(ledger.contains("\"trackerIssueNumber\": 7"));
}

#[test]
fn test_import_rejects_garbage() {
    let temp = project_with_tasks("- [ ] 1 Set up\n");
    let bogus = temp.path().join("bogus.json");
    std::fs::write(&bogus, r#"{"version": 99, "states": []}"#).unwrap();

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("import")
        .arg(&bogus)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unsupported version"));
}

#[test]
fn test_config_paths() {
    let temp = TempDir::new().unwrap();

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("config")
        .arg("paths")
        .assert()
        .success()
        .stdout(predicate::str::contains(".specsync/settings.json"))
        .stdout(predicate::str::contains(".sync-state.json"));
}

#[test]
fn test_config_show_json() {
    let temp = TempDir::new().unwrap();
    write_settings(
        temp.path(),
        r#"{"labels": ["spec-task"], "tracker": {"repository": "acme/app"}}"#,
    );

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("config")
        .arg("show")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"repository\": \"acme/app\""))
        .stdout(predicate::str::contains("spec-task"));
}

#[test]
fn test_config_validate_invalid_json() {
    let temp = TempDir::new().unwrap();
    write_settings(temp.path(), "{ not json");

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("config")
        .arg("validate")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("syntax error"));
}

#[test]
fn test_sync_without_token_fails_fast() {
    let temp = project_with_tasks("- [ ] 1 Set up\n");

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("sync")
        .arg("--repository")
        .arg("acme/app")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("token"));

    assert!(!temp.path().join(".kiro/specs/.sync-state.json").exists());
}

#[test]
fn test_sync_rejects_malformed_repository() {
    let temp = project_with_tasks("- [ ] 1 Set up\n");

    specsync()
        .arg("--project")
        .arg(temp.path())
        .arg("sync")
        .arg("--repository")
        .arg("not-a-slug")
        .arg("--token")
        .arg("t0k")
        .assert()
        .code(2);
}
