//! Core domain types for the Setpace guided workout engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Workout plans handed in by the content catalog
//! - Set and exercise progress records
//! - Session records emitted to the persistence collaborator
//! - Timer state and read-only engine snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Plan Types
// ============================================================================

/// One exercise as described by the program catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    /// Set-count text, e.g. "4 x 8-10"
    pub sets: String,
    /// Rest text, e.g. "90 sec", "3 min" or "N/A"
    pub rest: String,
    #[serde(default)]
    pub starting_weight: Option<f64>,
}

/// A day's worth of exercises from a training program
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutPlan {
    pub program_id: String,
    pub day_name: String,
    #[serde(default = "default_week_number")]
    pub week_number: u32,
    #[serde(default)]
    pub phase_name: String,
    pub exercises: Vec<ExerciseDefinition>,
}

fn default_week_number() -> u32 {
    1
}

// ============================================================================
// Progress Types
// ============================================================================

/// A single performed (or planned) set
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetRecord {
    pub id: Uuid,
    pub set_number: u32,
    pub weight: f64,
    pub actual_reps: Option<u32>,
    /// Target rep range text, e.g. "8-10"
    pub target_reps: String,
    pub duration_seconds: Option<u32>,
    pub rest_taken_seconds: Option<u32>,
    pub completed: bool,
    pub rpe: Option<u8>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SetRecord {
    /// A not-yet-performed set with default values
    pub fn planned(set_number: u32, target_reps: &str, weight: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            set_number,
            weight,
            actual_reps: None,
            target_reps: target_reps.to_string(),
            duration_seconds: None,
            rest_taken_seconds: None,
            completed: false,
            rpe: None,
            notes: None,
            completed_at: None,
        }
    }
}

/// Progress through one exercise of the session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseProgress {
    pub exercise_id: String,
    pub name: String,
    pub total_sets: u32,
    pub rest_seconds: u32,
    pub sets: Vec<SetRecord>,
    /// 1-based pointer to the active set, never above `total_sets`
    pub current_set: u32,
    pub completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExerciseProgress {
    /// Number of completed sets
    pub fn completed_sets(&self) -> u32 {
        self.sets.iter().filter(|s| s.completed).count() as u32
    }

    /// Whether every set in the sequence is completed
    pub fn all_sets_completed(&self) -> bool {
        self.sets.iter().all(|s| s.completed)
    }

    /// The record behind `current_set`
    pub fn current_record(&self) -> Option<&SetRecord> {
        self.set(self.current_set)
    }

    /// Look up a set by its 1-based number
    pub fn set(&self, set_number: u32) -> Option<&SetRecord> {
        let idx = set_number.checked_sub(1)? as usize;
        self.sets.get(idx)
    }

    pub(crate) fn set_mut(&mut self, set_number: u32) -> Option<&mut SetRecord> {
        let idx = set_number.checked_sub(1)? as usize;
        self.sets.get_mut(idx)
    }

    /// First incomplete set after `after`, if any
    pub(crate) fn next_incomplete_after(&self, after: u32) -> Option<u32> {
        self.sets
            .iter()
            .filter(|s| s.set_number > after && !s.completed)
            .map(|s| s.set_number)
            .next()
    }

    /// Best weight among completed sets
    pub fn best_completed_weight(&self) -> Option<f64> {
        self.sets
            .iter()
            .filter(|s| s.completed)
            .map(|s| s.weight)
            .fold(None, |best, w| match best {
                Some(b) if b >= w => Some(b),
                _ => Some(w),
            })
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// Lifecycle status of a session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Paused,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Paused => "paused",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

/// A guided workout session, as handed to the persistence collaborator
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub day_name: String,
    pub week_number: u32,
    pub phase_name: String,
    pub program_id: String,
    pub exercises: Vec<ExerciseProgress>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_duration_seconds: Option<u32>,
    pub xp_earned: u32,
    pub status: SessionStatus,
}

// ============================================================================
// Timer Types
// ============================================================================

/// Phase of the timing state machine
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    SetActive,
    Resting,
    /// Frozen while active or resting; `resting` tells which
    Paused { resting: bool },
    Complete,
    Abandoned,
}

impl EnginePhase {
    /// Complete and Abandoned accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnginePhase::Complete | EnginePhase::Abandoned)
    }

    /// Phases during which the 1 Hz clock must be subscribed
    pub fn needs_clock(&self) -> bool {
        matches!(self, EnginePhase::SetActive | EnginePhase::Resting)
    }
}

/// Timer values owned by the engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct TimerState {
    pub current_set: u32,
    pub total_sets: u32,
    pub rest_seconds: u32,
    pub elapsed_seconds: u32,
    pub resting: bool,
    pub running: bool,
    pub countdown_remaining: u32,
    pub set_started_at: Option<DateTime<Utc>>,
}

/// Read-only view of the engine for hosts and surfaces
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EngineSnapshot {
    pub phase: EnginePhase,
    pub exercise_index: usize,
    pub exercise_count: usize,
    pub exercise_name: String,
    pub target_reps: String,
    pub weight: f64,
    pub timer: TimerState,
    pub xp_earned: u32,
    pub sets_completed: u32,
    pub sets_planned: u32,
}

/// What the user reports when finishing a set
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SetPerformance {
    pub reps: Option<u32>,
    /// Overrides the set's planned weight when present
    pub weight: Option<f64>,
    pub rpe: Option<u8>,
    pub notes: Option<String>,
}

impl SetPerformance {
    pub fn reps(reps: u32) -> Self {
        Self {
            reps: Some(reps),
            ..Default::default()
        }
    }

    pub fn with_rpe(mut self, rpe: u8) -> Self {
        self.rpe = Some(rpe);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

// ============================================================================
// User State
// ============================================================================

/// Long-lived training state carried between sessions
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct UserTrainingState {
    /// Heaviest completed weight per exercise id
    #[serde(default)]
    pub personal_bests: HashMap<String, f64>,
    #[serde(default)]
    pub lifetime_xp: u64,
    #[serde(default)]
    pub sessions_completed: u32,
    #[serde(default)]
    pub sessions_abandoned: u32,
    #[serde(default)]
    pub last_session_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_with(completed: &[bool]) -> ExerciseProgress {
        let sets = completed
            .iter()
            .enumerate()
            .map(|(i, done)| {
                let mut s = SetRecord::planned(i as u32 + 1, "8-10", 100.0 + i as f64);
                s.completed = *done;
                s
            })
            .collect::<Vec<_>>();
        ExerciseProgress {
            exercise_id: "squat".into(),
            name: "Squat".into(),
            total_sets: sets.len() as u32,
            rest_seconds: 90,
            sets,
            current_set: 1,
            completed: false,
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_set_lookup_is_one_based() {
        let ex = exercise_with(&[false, false, false]);
        assert!(ex.set(0).is_none());
        assert_eq!(ex.set(1).unwrap().set_number, 1);
        assert_eq!(ex.set(3).unwrap().set_number, 3);
        assert!(ex.set(4).is_none());
    }

    #[test]
    fn test_next_incomplete_skips_completed() {
        let ex = exercise_with(&[true, true, false, true, false]);
        assert_eq!(ex.next_incomplete_after(1), Some(3));
        assert_eq!(ex.next_incomplete_after(3), Some(5));
        assert_eq!(ex.next_incomplete_after(5), None);
    }

    #[test]
    fn test_best_completed_weight() {
        let ex = exercise_with(&[true, false, true]);
        assert_eq!(ex.best_completed_weight(), Some(102.0));
        assert_eq!(exercise_with(&[false]).best_completed_weight(), None);
    }

    #[test]
    fn test_session_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(SessionStatus::Abandoned.as_str(), "abandoned");
    }

    #[test]
    fn test_phase_clock_requirements() {
        assert!(EnginePhase::SetActive.needs_clock());
        assert!(EnginePhase::Resting.needs_clock());
        assert!(!EnginePhase::Paused { resting: true }.needs_clock());
        assert!(!EnginePhase::Idle.needs_clock());
        assert!(EnginePhase::Abandoned.is_terminal());
    }
}
