//! Session aggregation: running XP total and the finished session record.

use crate::reward::{session_completion_bonus, RewardTable, SetReward};
use crate::{ExerciseProgress, SessionRecord, SessionStatus, WorkoutPlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Completion counters across a session
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTotals {
    pub sets_completed: u32,
    pub sets_planned: u32,
    pub exercises_completed: u32,
    pub exercises_planned: u32,
    /// Completed sets over planned sets, 0.0 ..= 1.0
    pub completion_ratio: f64,
}

/// Accumulates rewards and emits the session record exactly once
#[derive(Clone, Debug)]
pub struct SessionAggregator {
    id: Uuid,
    program_id: String,
    day_name: String,
    week_number: u32,
    phase_name: String,
    started_at: DateTime<Utc>,
    xp: u32,
    guided: bool,
    emitted: bool,
}

impl SessionAggregator {
    pub fn new(plan: &WorkoutPlan, guided: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            program_id: plan.program_id.clone(),
            day_name: plan.day_name.clone(),
            week_number: plan.week_number,
            phase_name: plan.phase_name.clone(),
            started_at: Utc::now(),
            xp: 0,
            guided,
            emitted: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn xp(&self) -> u32 {
        self.xp
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_emitted(&self) -> bool {
        self.emitted
    }

    pub fn record_set(&mut self, reward: &SetReward) {
        self.xp += reward.points;
    }

    /// Add the exercise-completion bonus and return it
    pub fn record_exercise_complete(&mut self, table: &RewardTable) -> u32 {
        self.xp += table.exercise_complete;
        table.exercise_complete
    }

    /// Build the final record. Only the first call returns `Some`.
    ///
    /// A `Completed` status adds the session bonus (plus the guided-mode
    /// bonus for guided sessions) before the snapshot is taken.
    pub fn finish(
        &mut self,
        status: SessionStatus,
        exercises: &[ExerciseProgress],
        table: &RewardTable,
    ) -> Option<SessionRecord> {
        if self.emitted {
            tracing::debug!("Session {} already emitted, ignoring finish", self.id);
            return None;
        }
        self.emitted = true;

        if status == SessionStatus::Completed {
            self.xp += session_completion_bonus(table, self.guided);
        }

        let now = Utc::now();
        let record = self.build(status, exercises, Some(now), now);
        tracing::info!(
            "Session {} finished as {}: {} XP over {}s",
            self.id,
            status.as_str(),
            record.xp_earned,
            record.total_duration_seconds.unwrap_or(0)
        );
        Some(record)
    }

    /// Interim snapshot for saving a session that is still running
    pub fn checkpoint(&self, status: SessionStatus, exercises: &[ExerciseProgress]) -> SessionRecord {
        self.build(status, exercises, None, Utc::now())
    }

    fn build(
        &self,
        status: SessionStatus,
        exercises: &[ExerciseProgress],
        completed_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> SessionRecord {
        let duration = (now - self.started_at).num_seconds().max(0) as u32;
        SessionRecord {
            id: self.id,
            day_name: self.day_name.clone(),
            week_number: self.week_number,
            phase_name: self.phase_name.clone(),
            program_id: self.program_id.clone(),
            exercises: exercises.to_vec(),
            started_at: self.started_at,
            completed_at,
            total_duration_seconds: Some(duration),
            xp_earned: self.xp,
            status,
        }
    }

    pub fn totals(exercises: &[ExerciseProgress]) -> SessionTotals {
        let sets_planned: u32 = exercises.iter().map(|e| e.total_sets).sum();
        let sets_completed: u32 = exercises.iter().map(|e| e.completed_sets()).sum();
        let exercises_completed = exercises.iter().filter(|e| e.completed).count() as u32;

        SessionTotals {
            sets_completed,
            sets_planned,
            exercises_completed,
            exercises_planned: exercises.len() as u32,
            completion_ratio: if sets_planned == 0 {
                0.0
            } else {
                sets_completed as f64 / sets_planned as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExerciseDefinition, SetRecord};

    fn plan() -> WorkoutPlan {
        WorkoutPlan {
            program_id: "strength_base".into(),
            day_name: "Lower A".into(),
            week_number: 3,
            phase_name: "Accumulation".into(),
            exercises: vec![ExerciseDefinition {
                id: "squat".into(),
                name: "Squat".into(),
                sets: "2 x 5".into(),
                rest: "2 min".into(),
                starting_weight: None,
            }],
        }
    }

    fn exercise(done: u32, total: u32) -> ExerciseProgress {
        let sets = (1..=total)
            .map(|n| {
                let mut s = SetRecord::planned(n, "5", 100.0);
                s.completed = n <= done;
                s
            })
            .collect();
        ExerciseProgress {
            exercise_id: "squat".into(),
            name: "Squat".into(),
            total_sets: total,
            rest_seconds: 120,
            sets,
            current_set: done.clamp(1, total),
            completed: done == total,
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_finish_emits_once() {
        let table = RewardTable::default();
        let mut agg = SessionAggregator::new(&plan(), false);
        agg.record_set(&SetReward {
            points: 15,
            ..Default::default()
        });

        let first = agg.finish(SessionStatus::Completed, &[exercise(2, 2)], &table);
        let second = agg.finish(SessionStatus::Completed, &[exercise(2, 2)], &table);

        let record = first.unwrap();
        assert!(second.is_none());
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.xp_earned, 15 + table.session_complete);
        assert_eq!(record.program_id, "strength_base");
        assert_eq!(record.week_number, 3);
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn test_guided_session_gets_guided_bonus() {
        let table = RewardTable::default();
        let mut agg = SessionAggregator::new(&plan(), true);
        let record = agg
            .finish(SessionStatus::Completed, &[exercise(2, 2)], &table)
            .unwrap();
        assert_eq!(record.xp_earned, table.session_complete + table.guided_mode);
    }

    #[test]
    fn test_abandoned_session_gets_no_session_bonus() {
        let table = RewardTable::default();
        let mut agg = SessionAggregator::new(&plan(), true);
        agg.record_exercise_complete(&table);
        let record = agg
            .finish(SessionStatus::Abandoned, &[exercise(1, 2)], &table)
            .unwrap();
        assert_eq!(record.status, SessionStatus::Abandoned);
        assert_eq!(record.xp_earned, table.exercise_complete);
    }

    #[test]
    fn test_emitted_record_is_a_snapshot() {
        let table = RewardTable::default();
        let mut agg = SessionAggregator::new(&plan(), false);
        let mut live = vec![exercise(2, 2)];
        let record = agg
            .finish(SessionStatus::Completed, &live, &table)
            .unwrap();

        live[0].sets[0].actual_reps = Some(99);
        live[0].name = "Renamed".into();

        assert_eq!(record.exercises[0].sets[0].actual_reps, None);
        assert_eq!(record.exercises[0].name, "Squat");
    }

    #[test]
    fn test_checkpoint_does_not_consume_emission() {
        let table = RewardTable::default();
        let mut agg = SessionAggregator::new(&plan(), false);
        let interim = agg.checkpoint(SessionStatus::InProgress, &[exercise(1, 2)]);
        assert_eq!(interim.status, SessionStatus::InProgress);
        assert!(interim.completed_at.is_none());
        assert!(!agg.is_emitted());
        assert!(agg
            .finish(SessionStatus::Completed, &[exercise(2, 2)], &table)
            .is_some());
    }

    #[test]
    fn test_totals() {
        let totals = SessionAggregator::totals(&[exercise(2, 2), exercise(1, 4)]);
        assert_eq!(totals.sets_completed, 3);
        assert_eq!(totals.sets_planned, 6);
        assert_eq!(totals.exercises_completed, 1);
        assert_eq!(totals.exercises_planned, 2);
        assert!((totals.completion_ratio - 0.5).abs() < f64::EPSILON);

        assert_eq!(SessionAggregator::totals(&[]).completion_ratio, 0.0);
    }
}
