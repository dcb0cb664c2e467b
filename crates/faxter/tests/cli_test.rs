#![allow(deprecated)] // TODO: move Command::cargo_bin to cargo_bin_cmd!

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn faxter() -> Command {
    let mut cmd = Command::cargo_bin("faxter").unwrap();
    cmd.env_remove("FAXTER_TOKEN")
        .env_remove("FAXTER_API_URL")
        .env_remove("RUST_LOG");
    cmd
}

/// Help lists every subcommand
#[test]
fn test_cli_help() {
    faxter()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("wait"));
}

#[test]
fn test_cli_version() {
    faxter()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("faxter"));
}

#[test]
fn test_wait_help() {
    faxter()
        .args(["wait", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<SERVER>"))
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--interval"));
}

/// Commands that reach the API fail cleanly without a token
#[test]
fn test_missing_token() {
    let dir = tempdir().unwrap();
    faxter()
        .env("FAXTER_CONFIG_PATH", dir.path().join("absent.yaml"))
        .args(["-C", dir.path().to_str().unwrap(), "refresh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAXTER_TOKEN"));
}

#[test]
fn test_state_list_empty() {
    let dir = tempdir().unwrap();
    faxter()
        .args(["-C", dir.path().to_str().unwrap(), "state", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No resources in state"));
}

/// Planning is local: no token needed
#[test]
fn test_plan_offline() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("faxter.yaml"),
        "resources:\n  - kind: project\n    name: demo\n  - kind: volume\n    name: data\n    project: demo\n    config:\n      storage: 10\n",
    )
    .unwrap();

    faxter()
        .args(["-C", dir.path().to_str().unwrap(), "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+ project.demo"))
        .stdout(predicate::str::contains("+ volume.data"))
        .stdout(predicate::str::contains("2 to create"));
}

#[test]
fn test_plan_rejects_duplicate_resources() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("faxter.yaml"),
        "resources:\n  - kind: project\n    name: demo\n  - kind: project\n    name: demo\n",
    )
    .unwrap();

    faxter()
        .args(["-C", dir.path().to_str().unwrap(), "plan"])
        .assert()
        .failure();
}

#[test]
fn test_destroy_all_requires_yes() {
    let dir = tempdir().unwrap();
    faxter()
        .env("FAXTER_TOKEN", "t")
        .args(["-C", dir.path().to_str().unwrap(), "destroy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}
