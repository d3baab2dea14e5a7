use std::path::Path;
use std::process::{Command, Output};

use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn run_nlplanner(root: &Path, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("nlplanner"))
        .current_dir(root)
        .env_remove("NLPLANNER_WORKSPACE")
        .args(args)
        .args(["--format", "json"])
        .output()
        .unwrap()
}

fn run_nlplanner_ok(root: &Path, args: &[&str]) -> Output {
    let output = run_nlplanner(root, args);
    assert!(
        output.status.success(),
        "command failed: nlplanner {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn run_nlplanner_json(root: &Path, args: &[&str]) -> Value {
    let output = run_nlplanner_ok(root, args);
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn project_task_lifecycle_through_cli() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    run_nlplanner_ok(root, &["init"]);

    let project = run_nlplanner_json(root, &["project", "create", "Website Redesign"]);
    assert_eq!(project["id"], "website-redesign");

    let task = run_nlplanner_json(
        root,
        &[
            "create",
            "Redesign homepage",
            "--project",
            "website-redesign",
            "--priority",
            "high",
            "--due",
            "2026-02-13",
            "--tag",
            "design,web",
        ],
    );
    assert_eq!(task["id"], "task-001");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["due"], "2026-02-13");

    let listed = run_nlplanner_json(root, &["list", "--project", "website-redesign"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let updated = run_nlplanner_json(root, &["update", "task-001", "--status", "in-progress"]);
    assert_eq!(updated["status"], "in-progress");
    assert_eq!(updated["tags"], serde_json::json!(["design", "web"]));

    run_nlplanner_ok(root, &["archive", "task-001"]);
    let active = run_nlplanner_json(root, &["list"]);
    assert!(active.as_array().unwrap().is_empty());
    let all = run_nlplanner_json(root, &["list", "--include-archived"]);
    assert_eq!(all[0]["status"], "archived");
}

#[test]
fn commands_find_workspace_from_subdirectory() {
    let dir = tempdir().unwrap();
    run_nlplanner_ok(dir.path(), &["init"]);
    run_nlplanner_ok(dir.path(), &["create", "Nested lookup"]);

    let nested = dir.path().join("projects/inbox");
    let shown = run_nlplanner_json(&nested, &["show", "task-001"]);
    assert_eq!(shown["title"], "Nested lookup");
}

#[test]
fn missing_task_reports_error_code() {
    let dir = tempdir().unwrap();
    run_nlplanner_ok(dir.path(), &["init"]);

    let output = run_nlplanner(dir.path(), &["show", "task-042"]);
    assert_eq!(output.status.code(), Some(1));
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"], "task_not_found");
}

#[test]
fn uninitialized_directory_is_rejected() {
    let dir = tempdir().unwrap();
    let output = run_nlplanner(dir.path(), &["list"]);
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"], "not_initialized");
}

#[test]
fn subtasks_and_tips_round_trip_through_cli() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    run_nlplanner_ok(root, &["init"]);
    run_nlplanner_ok(root, &["create", "Ship v1"]);

    run_nlplanner_ok(root, &["subtask", "add", "task-001", "write docs", "tag release"]);
    let toggled = run_nlplanner_json(root, &["subtask", "toggle", "task-001", "0"]);
    assert_eq!(toggled["subtask_count"], 2);
    assert_eq!(toggled["subtask_done"], 1);

    let tips = run_nlplanner_json(root, &["tips", "task-001", "run the smoke suite first"]);
    assert_eq!(tips[0], "run the smoke suite first");
}

#[test]
fn today_set_rejects_unknown_ids() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    run_nlplanner_ok(root, &["init"]);
    run_nlplanner_ok(root, &["create", "Focus"]);

    let output = run_nlplanner(root, &["today", "set", "task-001", "task-999"]);
    assert!(!output.status.success());

    let today = run_nlplanner_json(root, &["today", "set", "task-001"]);
    assert_eq!(today["task_ids"], serde_json::json!(["task-001"]));
}

#[test]
fn pretty_list_prints_rows() {
    let dir = tempdir().unwrap();
    run_nlplanner_ok(dir.path(), &["init"]);
    run_nlplanner_ok(dir.path(), &["create", "Pretty row", "--priority", "high"]);

    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("nlplanner"))
        .current_dir(dir.path())
        .env_remove("NLPLANNER_WORKSPACE")
        .env("NO_COLOR", "1")
        .args(["list", "--pretty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("task-001").and(predicate::str::contains("Pretty row")));
}

#[test]
fn progress_is_set_on_create_and_update() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    run_nlplanner_ok(root, &["init"]);

    let task = run_nlplanner_json(root, &["create", "Migrate", "--progress", "40"]);
    assert_eq!(task["progress"], 40);

    let output = run_nlplanner(root, &["update", "task-001", "--progress", "101"]);
    assert!(!output.status.success());
    assert_eq!(run_nlplanner_json(root, &["show", "task-001"])["progress"], 40);

    let updated = run_nlplanner_json(root, &["update", "task-001", "--progress", "80"]);
    assert_eq!(updated["progress"], 80);
}
