//! CLI integration tests for archstage
//!
//! These tests drive the binary through complete workflows, from
//! initialization through staging, previewing, and committing changesets.

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command instance for the archstage binary
fn archstage_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("archstage"))
}

/// Create a temporary directory and initialize an archstage project
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    archstage_cmd().arg("init").arg(dir.path()).assert().success();
    dir
}

/// Run a command inside the project and require success
fn run_ok(dir: &TempDir, args: &[&str]) -> String {
    let output = archstage_cmd()
        .current_dir(dir.path())
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "archstage {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

/// Write a layer file directly, as another tool or process would
fn write_layer(dir: &TempDir, layer: &str, yaml: &str) {
    fs::write(dir.path().join(".archstage/model").join(format!("{}.yaml", layer)), yaml).unwrap();
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_init_creates_structure() {
    let dir = TempDir::new().unwrap();

    archstage_cmd()
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized archstage project"));

    assert!(dir.path().join(".archstage").is_dir());
    assert!(dir.path().join(".archstage/model").is_dir());
    assert!(dir.path().join(".archstage/changesets").is_dir());
    assert!(dir.path().join(".archstage/config.toml").is_file());
    assert!(dir.path().join(".archstage/.gitignore").is_file());
}

#[test]
fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();

    archstage_cmd().arg("init").arg(dir.path()).assert().success();
    archstage_cmd().arg("init").arg(dir.path()).assert().success();
}

#[test]
fn test_not_in_project_error() {
    let dir = TempDir::new().unwrap();

    archstage_cmd()
        .current_dir(dir.path())
        .args(["changeset", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not in an archstage project"));
}

// =============================================================================
// Changeset Tests
// =============================================================================

#[test]
fn test_changeset_create_activates() {
    let dir = setup_project();

    archstage_cmd()
        .current_dir(dir.path())
        .args(["changeset", "create", "add-endpoint", "--name", "Add endpoint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created changeset: add-endpoint"));

    assert!(dir.path().join(".archstage/changesets/add-endpoint.jsonl").is_file());
    let active = fs::read_to_string(dir.path().join(".archstage/changesets/ACTIVE")).unwrap();
    assert_eq!(active.trim(), "add-endpoint");

    archstage_cmd()
        .current_dir(dir.path())
        .args(["changeset", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* add-endpoint"))
        .stdout(predicate::str::contains("staged"));
}

#[test]
fn test_changeset_duplicate_id_error() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "dup"]);

    archstage_cmd()
        .current_dir(dir.path())
        .args(["changeset", "create", "dup"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Changeset already exists: dup"));
}

#[test]
fn test_changeset_invalid_id_error() {
    let dir = setup_project();

    archstage_cmd()
        .current_dir(dir.path())
        .args(["changeset", "create", "Not Valid"])
        .assert()
        .failure();
}

#[test]
fn test_no_active_changeset_error() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "quiet", "--no-activate"]);

    archstage_cmd()
        .current_dir(dir.path())
        .args(["preview"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No active changeset"));

    run_ok(&dir, &["preview", "--changeset", "quiet"]);
}

// =============================================================================
// Staging Tests
// =============================================================================

#[test]
fn test_stage_and_preview() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "add-endpoint"]);

    archstage_cmd()
        .current_dir(dir.path())
        .args([
            "stage",
            "add",
            "api.operation.create-user",
            "--name",
            "Create user",
            "--prop",
            "method=POST",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Staged #1: add api.operation.create-user"));

    archstage_cmd()
        .current_dir(dir.path())
        .args(["preview", "--layer", "api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api.operation.create-user"));

    // Nothing is written to the model before commit
    assert!(!dir.path().join(".archstage/model/api.yaml").exists());
}

#[test]
fn test_preview_json_format() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "json-preview"]);
    run_ok(&dir, &["stage", "add", "api.operation.a", "--name", "A", "--prop", "retries=3"]);

    let stdout = run_ok(&dir, &["--format", "json", "preview"]);
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();

    assert_eq!(json["changeset"], "json-preview");
    assert_eq!(json["elements"][0]["id"], "api.operation.a");
    assert_eq!(json["elements"][0]["layer"], "api");
    assert_eq!(json["elements"][0]["properties"]["retries"], 3.0);
}

#[test]
fn test_unstage_keeps_numbering() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "gaps"]);
    run_ok(&dir, &["stage", "add", "api.operation.a", "--name", "A"]);
    run_ok(&dir, &["stage", "add", "api.operation.b", "--name", "B"]);

    archstage_cmd()
        .current_dir(dir.path())
        .args(["unstage", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unstaged #2"));

    archstage_cmd()
        .current_dir(dir.path())
        .args(["stage", "add", "api.operation.c", "--name", "C"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Staged #3"));

    archstage_cmd()
        .current_dir(dir.path())
        .args(["unstage", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no change #9"));
}

#[test]
fn test_update_requires_something_to_change() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "empty-update"]);

    archstage_cmd()
        .current_dir(dir.path())
        .args(["stage", "update", "business.service.y"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to update"));
}

#[test]
fn test_duplicate_add_conflicts_on_preview() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "conflict"]);
    run_ok(&dir, &["stage", "add", "business.service.x", "--name", "X"]);
    run_ok(&dir, &["stage", "add", "business.service.x", "--name", "X again"]);

    archstage_cmd()
        .current_dir(dir.path())
        .args(["preview"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists: business.service.x"));
}

// =============================================================================
// Commit Tests
// =============================================================================

#[test]
fn test_commit_writes_model() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "add-endpoint"]);
    run_ok(
        &dir,
        &[
            "stage",
            "add",
            "api.operation.create-user",
            "--name",
            "Create user",
            "--prop",
            "method=POST",
        ],
    );

    archstage_cmd()
        .current_dir(dir.path())
        .args(["commit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Committed add-endpoint: 1 change(s) across api"));

    let layer = fs::read_to_string(dir.path().join(".archstage/model/api.yaml")).unwrap();
    assert!(layer.contains("api.operation.create-user"));
    assert!(layer.contains("POST"));

    // Active pointer is cleared and the changeset is terminal
    assert!(!dir.path().join(".archstage/changesets/ACTIVE").exists());
    archstage_cmd()
        .current_dir(dir.path())
        .args(["stage", "delete", "api.operation.create-user", "--changeset", "add-endpoint"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("it is committed"));

    archstage_cmd()
        .current_dir(dir.path())
        .args(["element", "show", "api.operation.create-user"])
        .assert()
        .success()
        .stdout(predicate::str::contains("method: POST"));
}

#[test]
fn test_commit_blocks_on_validation_errors() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "dangling"]);
    run_ok(
        &dir,
        &[
            "stage",
            "add",
            "api.operation.a",
            "--name",
            "A",
            "--prop",
            "realizes=business.service.missing",
        ],
    );

    archstage_cmd()
        .current_dir(dir.path())
        .args(["validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("business.service.missing"));

    archstage_cmd()
        .current_dir(dir.path())
        .args(["commit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert!(!dir.path().join(".archstage/model/api.yaml").exists());

    archstage_cmd()
        .current_dir(dir.path())
        .args(["commit", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(forced)"));
}

#[test]
fn test_drift_and_strict_commit() {
    let dir = setup_project();
    write_layer(
        &dir,
        "business",
        "business.service.y:\n  id: business.service.y\n  layer: business\n  type: service\n  name: Service Y\n",
    );
    run_ok(&dir, &["changeset", "create", "rename-y"]);
    run_ok(&dir, &["stage", "update", "business.service.y", "--name", "Y2"]);

    archstage_cmd()
        .current_dir(dir.path())
        .args(["drift"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No drift"));

    // Someone else edits Y
    write_layer(
        &dir,
        "business",
        "business.service.y:\n  id: business.service.y\n  layer: business\n  type: service\n  name: External\n",
    );

    archstage_cmd()
        .current_dir(dir.path())
        .args(["drift"])
        .assert()
        .success()
        .stdout(predicate::str::contains("business.service.y  (staged)"));

    archstage_cmd()
        .current_dir(dir.path())
        .args(["commit", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("affecting staged elements: business.service.y"));

    archstage_cmd()
        .current_dir(dir.path())
        .args(["commit", "--strict", "--force"])
        .assert()
        .success();

    let layer = fs::read_to_string(dir.path().join(".archstage/model/business.yaml")).unwrap();
    assert!(layer.contains("name: Y2"));
}

#[test]
fn test_discard_leaves_model_untouched() {
    let dir = setup_project();
    run_ok(&dir, &["changeset", "create", "throwaway"]);
    run_ok(&dir, &["stage", "add", "api.operation.a", "--name", "A"]);

    archstage_cmd()
        .current_dir(dir.path())
        .args(["discard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Discarded throwaway"));

    assert!(!dir.path().join(".archstage/model/api.yaml").exists());

    // The id can be reused; the old record is archived
    run_ok(&dir, &["changeset", "create", "throwaway"]);
    let archived = fs::read_dir(dir.path().join(".archstage/changesets/archive"))
        .unwrap()
        .count();
    assert_eq!(archived, 1);
}

#[test]
fn test_verbose_flag() {
    let dir = setup_project();

    archstage_cmd()
        .current_dir(dir.path())
        .args(["--verbose", "changeset", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("[verbose]"));
}

#[test]
fn test_element_list_json() {
    let dir = setup_project();
    write_layer(
        &dir,
        "business",
        "business.service.y:\n  id: business.service.y\n  layer: business\n  type: service\n  name: Service Y\n",
    );

    let stdout = run_ok(&dir, &["--format", "json", "element", "list", "--layer", "business"]);
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(json[0]["id"], "business.service.y");
    assert_eq!(json[0]["type"], "service");
}

#[test]
fn test_element_list_rolls_back_crashed_commit() {
    let dir = setup_project();
    write_layer(
        &dir,
        "business",
        "business.service.y:\n  id: business.service.y\n  layer: business\n  type: service\n  name: Service Y\n",
    );
    // The api layer was written by a commit that died before finishing
    write_layer(
        &dir,
        "api",
        "api.operation.half:\n  id: api.operation.half\n  layer: api\n  type: operation\n  name: Half\n",
    );
    let journal = dir.path().join(".archstage/changesets/commit.journal.json");
    fs::write(
        &journal,
        r#"{"changesetId":"crashed","startedAt":"2026-01-01T00:00:00Z","preImages":{"api":{}}}"#,
    )
    .unwrap();

    let stdout = run_ok(&dir, &["element", "list"]);
    assert!(stdout.contains("business.service.y"));
    assert!(!stdout.contains("api.operation.half"));
    assert!(!journal.exists());
    assert!(!dir.path().join(".archstage/model/api.yaml").exists());
}
