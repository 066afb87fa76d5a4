//! Integration tests for the setpace binary.
//!
//! These tests verify end-to-end behavior including:
//! - Guided workouts on the simulated clock
//! - Session logging and training state updates
//! - CSV rollup operations
//! - Set/rest text interpretation

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("setpace"))
}

fn run_auto(data_dir: &Path) -> assert_cmd::assert::Assert {
    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--auto")
        .arg("--no-cues")
        .assert()
}

const PLAN: &str = r#"
program_id = "test_program"
day_name = "Pull Day"
week_number = 3
phase_name = "Intensification"

[[exercises]]
id = "deadlift"
name = "Deadlift"
sets = "2 x 5"
rest = "3 min"
starting_weight = 140.0

[[exercises]]
id = "chin_up"
name = "Chin-up"
sets = "2 x AMRAP"
rest = "N/A"
"#;

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Guided set and rest timer for strength workouts",
        ));
}

#[test]
fn test_parse_command() {
    cli()
        .args(["parse", "4 x 8-10", "3 min"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sets: 4"))
        .stdout(predicate::str::contains("Target reps: 8 to 10"))
        .stdout(predicate::str::contains("Rest: 180 seconds"));
}

#[test]
fn test_parse_command_defaults() {
    cli()
        .args(["parse", "garbage", "???"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sets: 1"))
        .stdout(predicate::str::contains("Rest: 90 seconds"));

    cli()
        .args(["parse", "3 x 45s", "N/A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Target: 45s"))
        .stdout(predicate::str::contains("Rest: 0 seconds"));
}

#[test]
fn test_auto_workout_logs_completed_session() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    run_auto(data_dir)
        .success()
        .stdout(predicate::str::contains("Workout complete"));

    let wal_path = data_dir.join("wal/sessions.wal");
    let wal = fs::read_to_string(&wal_path).expect("Failed to read WAL");
    assert_eq!(wal.lines().count(), 1);

    let session: serde_json::Value = serde_json::from_str(wal.trim()).unwrap();
    assert_eq!(session["status"], "completed");
    assert_eq!(session["program_id"], "setpace_sample");
    assert!(session["xp_earned"].as_u64().unwrap() > 0);
    assert!(session["exercises"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["completed"] == true));
}

#[test]
fn test_training_state_accumulates_across_runs() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    run_auto(data_dir).success();
    run_auto(data_dir).success();

    let state: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(data_dir.join("wal/state.json")).expect("Failed to read state"),
    )
    .unwrap();
    assert_eq!(state["sessions_completed"], 2);
    assert_eq!(state["personal_bests"]["goblet_squat"], 24.0);
    assert!(state["lifetime_xp"].as_u64().unwrap() > 0);
}

#[test]
fn test_custom_plan() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let plan_path = data_dir.join("pull.toml");
    fs::write(&plan_path, PLAN).unwrap();

    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--plan")
        .arg(&plan_path)
        .arg("--auto")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pull Day (week 3)"))
        .stdout(predicate::str::contains("Deadlift"));

    let wal = fs::read_to_string(data_dir.join("wal/sessions.wal")).unwrap();
    assert!(wal.contains("\"program_id\":\"test_program\""));
}

#[test]
fn test_invalid_plan_fails() {
    let temp_dir = setup_test_dir();
    let plan_path = temp_dir.path().join("empty.toml");
    fs::write(&plan_path, "program_id = \"p\"\nday_name = \"d\"\nexercises = []\n").unwrap();

    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--plan")
        .arg(&plan_path)
        .arg("--auto")
        .assert()
        .failure();

    assert!(!temp_dir.path().join("wal/sessions.wal").exists());
}

#[test]
fn test_companion_file_is_released_after_workout() {
    let temp_dir = setup_test_dir();
    let companion = temp_dir.path().join("companion.json");

    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--auto")
        .arg("--companion")
        .arg(&companion)
        .assert()
        .success();

    assert!(!companion.exists());
}

#[test]
fn test_rollup_creates_csv() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    run_auto(data_dir).success();
    run_auto(data_dir).success();

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled up 2 sessions"));

    let csv_content = fs::read_to_string(data_dir.join("sessions.csv")).unwrap();
    let mut lines = csv_content.lines();
    assert!(lines.next().unwrap().starts_with("id,program_id,day_name"));
    assert_eq!(lines.filter(|l| l.contains(",completed,")).count(), 2);

    assert!(!data_dir.join("wal/sessions.wal").exists());
    assert!(data_dir.join("wal/sessions.wal.processed").exists());
}

#[test]
fn test_rollup_with_cleanup() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    run_auto(data_dir).success();

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaned up 1 processed WAL files"));

    assert!(!data_dir.join("wal/sessions.wal.processed").exists());
    assert!(data_dir.join("sessions.csv").exists());
}

#[test]
fn test_empty_rollup() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to roll up"));
}

#[test]
fn test_closed_stdin_saves_checkpoint() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("guide")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--no-cues")
        .write_stdin("s\nd 10 8\nc\n")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("Progress saved: 1/6 sets"));

    let checkpoint: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp_dir.path().join("wal/checkpoint.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(checkpoint["status"], "in_progress");
    assert!(!temp_dir.path().join("wal/sessions.wal").exists());
}
