//! Concurrency tests for setpace.
//!
//! Several processes appending to the same session log must not lose or
//! interleave records.

use assert_cmd::Command;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("setpace"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn run_workout(data_dir: &Path) {
    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--auto")
        .arg("--no-cues")
        .assert()
        .success();
}

#[test]
fn test_sequential_session_logging() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    for i in 0..5 {
        thread::sleep(Duration::from_millis(i * 5));
        run_workout(&data_dir);
    }

    let wal_content =
        std::fs::read_to_string(data_dir.join("wal/sessions.wal")).expect("Failed to read WAL");
    let session_count = wal_content.lines().count();
    assert_eq!(
        session_count, 5,
        "Expected 5 sessions, got {}",
        session_count
    );

    let state: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(data_dir.join("wal/state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["sessions_completed"], 5);
}

#[test]
fn test_no_wal_corruption_under_load() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let data_dir = data_dir.clone();
            thread::spawn(move || run_workout(&data_dir))
        })
        .collect();
    for handle in handles {
        handle.join().expect("Workout thread panicked");
    }

    let wal_content =
        std::fs::read_to_string(data_dir.join("wal/sessions.wal")).expect("Failed to read WAL");
    assert_eq!(wal_content.lines().count(), 4);
    for (i, line) in wal_content.lines().enumerate() {
        let session: serde_json::Value = serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("Line {} is not valid JSON: {}", i + 1, e));
        assert_eq!(session["status"], "completed");
    }
}

#[test]
fn test_rollup_after_parallel_writes() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let data_dir = data_dir.clone();
            thread::spawn(move || run_workout(&data_dir))
        })
        .collect();
    for handle in handles {
        handle.join().expect("Workout thread panicked");
    }

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    let csv = std::fs::read_to_string(data_dir.join("sessions.csv")).unwrap();
    assert_eq!(csv.lines().count(), 4);
}
