use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reward::SetReward;
use crate::{SessionRecord, SetRecord};

/// Every engine transition produces one or more events.
/// Hosts react to them; the cue scheduler maps them to sounds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    SetStarted {
        exercise_index: usize,
        set_number: u32,
        at: DateTime<Utc>,
    },
    SetTick {
        elapsed_seconds: u32,
    },
    SetCompleted {
        exercise_index: usize,
        record: SetRecord,
        reward: SetReward,
    },
    SetCorrected {
        exercise_index: usize,
        record: SetRecord,
    },
    RestStarted {
        exercise_index: usize,
        duration_seconds: u32,
    },
    RestTick {
        remaining_seconds: u32,
    },
    /// Countdown reached zero; the engine is Idle again.
    RestCompleted {
        exercise_index: usize,
        next_set: u32,
    },
    RestSkipped {
        remaining_seconds: u32,
    },
    ExerciseCompleted {
        exercise_index: usize,
        exercise_id: String,
        bonus_points: u32,
    },
    /// The engine moved on to the next unfinished exercise.
    ExerciseAdvanced {
        exercise_index: usize,
    },
    WorkoutCompleted {
        session: Box<SessionRecord>,
    },
    WorkoutAbandoned {
        session: Box<SessionRecord>,
    },
    Paused {
        resting: bool,
    },
    Resumed {
        resting: bool,
    },
    Navigated {
        exercise_index: usize,
        set_number: u32,
    },
    NavigationRejected {
        exercise_index: usize,
        set_number: u32,
    },
    WeightChanged {
        exercise_index: usize,
        weight: f64,
    },
}

impl EngineEvent {
    /// Events that only report clock progress
    pub fn is_tick(&self) -> bool {
        matches!(self, EngineEvent::SetTick { .. } | EngineEvent::RestTick { .. })
    }
}
