//! Command line tests for the `notekit` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn notekit() -> Command {
    let mut cmd = Command::cargo_bin("notekit").unwrap();
    cmd.env_remove("NOTEKIT_DATA_DIR").env_remove("RUST_LOG");
    cmd
}

fn git_available() -> bool {
    which::which("git").is_ok()
}

#[test]
fn test_help_lists_subcommands() {
    notekit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("note"))
        .stdout(predicate::str::contains("chat"));
}

#[test]
fn test_note_requires_text() {
    notekit().args(["note", "garden"]).assert().failure();
}

#[test]
fn test_init_then_list() {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_str().unwrap();

    notekit()
        .args(["--root", root, "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notekit initialized"));
    assert!(dir.path().join(".notekit/config.toml").is_file());
    assert!(dir.path().join(".notekit/agents/architect.md").is_file());
    assert!(dir.path().join("data/.git").is_dir());

    notekit()
        .args(["--root", root, "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    notekit()
        .args(["--root", root, "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No projects yet."));
}

#[test]
fn test_read_lists_document() {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    notekit().args(["--root", root, "init", "--minimal"]).assert().success();
    std::fs::write(dir.path().join("data/projects/garden.md"), "# Garden\n").unwrap();

    notekit()
        .args(["--root", root, "read", "garden"])
        .assert()
        .success()
        .stdout("# Garden\n");

    notekit()
        .args(["--root", root, "read", "kitchen"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    notekit()
        .args(["--root", root, "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("garden"));
}
