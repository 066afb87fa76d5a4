//! Corruption recovery tests for setpace.
//!
//! These tests verify the system can handle:
//! - Corrupted state files
//! - Corrupted WAL files
//! - Partial writes

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("setpace"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_corrupted_state_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::create_dir_all(data_dir.join("wal")).unwrap();
    let state_path = data_dir.join("wal/state.json");
    fs::write(&state_path, "{ invalid json }}}}").expect("Failed to write corrupted state");

    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--auto")
        .arg("--no-cues")
        .assert()
        .success();

    // The workout rewrites a valid state file
    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(state["sessions_completed"], 1);
}

#[test]
fn test_empty_state_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::create_dir_all(data_dir.join("wal")).unwrap();
    fs::write(data_dir.join("wal/state.json"), "").unwrap();

    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--auto")
        .arg("--no-cues")
        .assert()
        .success();
}

#[test]
fn test_corrupted_wal_lines_skipped_during_rollup() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--auto")
        .arg("--no-cues")
        .assert()
        .success();

    // Simulate a crash mid-append
    let wal_path = data_dir.join("wal/sessions.wal");
    let mut file = fs::OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(b"{\"id\":\"partial\",\"program_id\":").unwrap();
    drop(file);

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled up 1 sessions"));
}

#[test]
fn test_garbage_wal_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::create_dir_all(data_dir.join("wal")).unwrap();
    fs::write(
        data_dir.join("wal/sessions.wal"),
        "{ invalid json }\n{ more invalid }",
    )
    .unwrap();

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled up 0 sessions"));
}

#[test]
fn test_logging_continues_after_corrupt_wal() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::create_dir_all(data_dir.join("wal")).unwrap();
    let wal_path = data_dir.join("wal/sessions.wal");
    fs::write(&wal_path, "not a session\n").unwrap();

    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--auto")
        .arg("--no-cues")
        .assert()
        .success();

    let wal = fs::read_to_string(&wal_path).unwrap();
    assert_eq!(wal.lines().count(), 2);
    assert!(serde_json::from_str::<serde_json::Value>(wal.lines().last().unwrap()).is_ok());
}
