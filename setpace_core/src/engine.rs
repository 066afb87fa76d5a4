//! Set/rest timing state machine.
//!
//! The engine has no timers of its own: the host calls [`TimingEngine::tick`]
//! once per second while the phase needs a clock, and feeds user actions
//! through the command methods. Every command returns the events it
//! produced; an empty vector means the command did not apply in the current
//! phase.
//!
//! ## Phases
//!
//! ```text
//! Idle -> SetActive -> Resting -> Idle -> ... -> Complete
//!            |            |
//!            +-> Paused <-+            (any non-terminal) -> Abandoned
//! ```

use std::collections::HashMap;

use chrono::Utc;

use crate::reward::{compute_set_reward, RewardTable, SetContext};
use crate::session::{SessionAggregator, SessionTotals};
use crate::{
    EngineEvent, EnginePhase, EngineSnapshot, ExerciseProgress, Result, SessionRecord,
    SessionStatus, SetPerformance, TimerState, WorkoutPlan,
};

/// The guided workout state machine
#[derive(Debug, Clone)]
pub struct TimingEngine {
    exercises: Vec<ExerciseProgress>,
    exercise_index: usize,
    phase: EnginePhase,
    timer: TimerState,
    /// Seconds counted down in the current rest period
    rest_elapsed: u32,
    /// Rest actually taken before the set that starts next
    pending_rest_taken: Option<u32>,
    rewards: RewardTable,
    personal_bests: HashMap<String, f64>,
    aggregator: SessionAggregator,
}

impl TimingEngine {
    /// Create an engine for `plan`, parsing its set and rest text.
    pub fn new(plan: &WorkoutPlan, rewards: RewardTable) -> Result<Self> {
        plan.validate()?;

        let mut engine = Self {
            exercises: plan.build_progress(),
            exercise_index: 0,
            phase: EnginePhase::Idle,
            timer: TimerState::default(),
            rest_elapsed: 0,
            pending_rest_taken: None,
            rewards,
            personal_bests: HashMap::new(),
            aggregator: SessionAggregator::new(plan, true),
        };
        engine.reset_timer();

        tracing::info!(
            "Guided session {} ready: {} exercises",
            engine.aggregator.id(),
            engine.exercises.len()
        );
        Ok(engine)
    }

    /// Seed the best weight previously recorded for each exercise id
    pub fn with_personal_bests(mut self, bests: HashMap<String, f64>) -> Self {
        self.personal_bests = bests;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn exercise_index(&self) -> usize {
        self.exercise_index
    }

    pub fn exercises(&self) -> &[ExerciseProgress] {
        &self.exercises
    }

    pub fn current_exercise(&self) -> &ExerciseProgress {
        &self.exercises[self.exercise_index]
    }

    pub fn timer(&self) -> &TimerState {
        &self.timer
    }

    pub fn xp(&self) -> u32 {
        self.aggregator.xp()
    }

    pub fn rewards(&self) -> &RewardTable {
        &self.rewards
    }

    pub fn personal_bests(&self) -> &HashMap<String, f64> {
        &self.personal_bests
    }

    pub fn totals(&self) -> SessionTotals {
        SessionAggregator::totals(&self.exercises)
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Copy of everything a surface needs to render
    pub fn snapshot(&self) -> EngineSnapshot {
        let exercise = self.current_exercise();
        let record = exercise.current_record();
        let totals = self.totals();

        EngineSnapshot {
            phase: self.phase,
            exercise_index: self.exercise_index,
            exercise_count: self.exercises.len(),
            exercise_name: exercise.name.clone(),
            target_reps: record.map(|r| r.target_reps.clone()).unwrap_or_default(),
            weight: record.map(|r| r.weight).unwrap_or(0.0),
            timer: self.timer.clone(),
            xp_earned: self.xp(),
            sets_completed: totals.sets_completed,
            sets_planned: totals.sets_planned,
        }
    }

    /// Interim session record; does not count as the one-time emission
    pub fn checkpoint(&self) -> SessionRecord {
        let status = match self.phase {
            EnginePhase::Paused { .. } => SessionStatus::Paused,
            EnginePhase::Complete => SessionStatus::Completed,
            EnginePhase::Abandoned => SessionStatus::Abandoned,
            _ => SessionStatus::InProgress,
        };
        self.aggregator.checkpoint(status, &self.exercises)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle → SetActive
    pub fn start_set(&mut self) -> Vec<EngineEvent> {
        if self.phase != EnginePhase::Idle {
            tracing::debug!("start_set ignored in {:?}", self.phase);
            return vec![];
        }

        let exercise_index = self.exercise_index;
        let exercise = &mut self.exercises[exercise_index];
        let set_number = exercise.current_set;
        if exercise.current_record().map_or(true, |r| r.completed) {
            tracing::debug!(
                "Set {} of {} is already completed; not starting",
                set_number,
                exercise.exercise_id
            );
            return vec![];
        }

        let now = Utc::now();
        exercise.started_at.get_or_insert(now);

        self.timer.current_set = set_number;
        self.timer.elapsed_seconds = 0;
        self.timer.countdown_remaining = 0;
        self.timer.resting = false;
        self.timer.running = true;
        self.timer.set_started_at = Some(now);
        self.phase = EnginePhase::SetActive;

        tracing::info!("Started {} set {}", exercise.name, set_number);
        vec![EngineEvent::SetStarted {
            exercise_index,
            set_number,
            at: now,
        }]
    }

    /// One clock tick (nominally one second)
    pub fn tick(&mut self) -> Vec<EngineEvent> {
        match self.phase {
            EnginePhase::SetActive => {
                self.timer.elapsed_seconds += 1;
                tracing::trace!("Set elapsed {}s", self.timer.elapsed_seconds);
                vec![EngineEvent::SetTick {
                    elapsed_seconds: self.timer.elapsed_seconds,
                }]
            }
            EnginePhase::Resting => {
                self.timer.countdown_remaining = self.timer.countdown_remaining.saturating_sub(1);
                self.rest_elapsed += 1;
                let remaining = self.timer.countdown_remaining;
                tracing::trace!("Rest remaining {}s", remaining);

                let mut events = vec![EngineEvent::RestTick {
                    remaining_seconds: remaining,
                }];
                if remaining == 0 {
                    events.push(self.end_rest());
                }
                events
            }
            _ => vec![],
        }
    }

    /// SetActive → Resting, Idle on the next exercise, or Complete.
    ///
    /// Completing a set that is not active (including a second request for
    /// the set that was just completed) is a no-op.
    pub fn complete_set(&mut self, performance: SetPerformance) -> Vec<EngineEvent> {
        if self.phase != EnginePhase::SetActive {
            tracing::debug!("complete_set ignored in {:?}", self.phase);
            return vec![];
        }

        let now = Utc::now();
        let exercise_index = self.exercise_index;
        let elapsed = self.timer.elapsed_seconds;
        let rest_taken = self.pending_rest_taken.take();

        let exercise = &mut self.exercises[exercise_index];
        let exercise_id = exercise.exercise_id.clone();
        let set_number = exercise.current_set;
        let ctx = SetContext {
            target_rest_seconds: exercise.rest_seconds,
            previous_best_weight: self.personal_bests.get(&exercise_id).copied(),
        };

        let record = match exercise.set_mut(set_number) {
            Some(record) if !record.completed => record,
            _ => return vec![],
        };
        if let Some(weight) = performance.weight.filter(|w| w.is_finite() && *w >= 0.0) {
            record.weight = weight;
        }
        record.actual_reps = performance.reps;
        record.rpe = performance.rpe.map(|r| r.clamp(1, 10));
        record.notes = performance.notes;
        record.duration_seconds = Some(elapsed);
        record.rest_taken_seconds = rest_taken;
        record.completed = true;
        record.completed_at = Some(now);
        let record = record.clone();

        let reward = compute_set_reward(&record, &ctx, &self.rewards);
        self.aggregator.record_set(&reward);
        if record.weight > 0.0 && ctx.previous_best_weight.map_or(true, |best| record.weight > best) {
            self.personal_bests.insert(exercise_id.clone(), record.weight);
        }

        tracing::info!(
            "Completed {} set {} ({:?} reps @ {}) for {} XP",
            exercise.name,
            set_number,
            record.actual_reps,
            record.weight,
            reward.points
        );

        let mut events = vec![EngineEvent::SetCompleted {
            exercise_index,
            record,
            reward,
        }];

        self.timer.running = false;

        if exercise.all_sets_completed() {
            exercise.completed = true;
            exercise.completed_at = Some(now);
            let bonus_points = self.aggregator.record_exercise_complete(&self.rewards);
            events.push(EngineEvent::ExerciseCompleted {
                exercise_index,
                exercise_id,
                bonus_points,
            });
            events.extend(self.advance_exercise());
            return events;
        }

        let next = exercise
            .next_incomplete_after(set_number)
            .or_else(|| exercise.next_incomplete_after(0))
            .unwrap_or(set_number);
        exercise.current_set = next;
        let rest_seconds = exercise.rest_seconds;
        self.timer.current_set = next;

        if rest_seconds == 0 {
            self.phase = EnginePhase::Idle;
            return events;
        }

        self.phase = EnginePhase::Resting;
        self.rest_elapsed = 0;
        self.timer.resting = true;
        self.timer.running = true;
        self.timer.countdown_remaining = rest_seconds;
        events.push(EngineEvent::RestStarted {
            exercise_index,
            duration_seconds: rest_seconds,
        });
        events
    }

    /// Resting → Idle before the countdown runs out
    pub fn skip_rest(&mut self) -> Vec<EngineEvent> {
        if !matches!(
            self.phase,
            EnginePhase::Resting | EnginePhase::Paused { resting: true }
        ) {
            return vec![];
        }

        let remaining = self.timer.countdown_remaining;
        self.end_rest();
        tracing::info!("Rest skipped with {}s remaining", remaining);
        vec![EngineEvent::RestSkipped {
            remaining_seconds: remaining,
        }]
    }

    /// Freeze an active set or rest period
    pub fn pause(&mut self) -> Vec<EngineEvent> {
        let resting = match self.phase {
            EnginePhase::SetActive => false,
            EnginePhase::Resting => true,
            _ => return vec![],
        };
        self.phase = EnginePhase::Paused { resting };
        self.timer.running = false;
        tracing::info!("Paused ({})", if resting { "rest" } else { "set" });
        vec![EngineEvent::Paused { resting }]
    }

    /// Continue where [`pause`](TimingEngine::pause) left off
    pub fn resume(&mut self) -> Vec<EngineEvent> {
        let EnginePhase::Paused { resting } = self.phase else {
            return vec![];
        };
        self.phase = if resting {
            EnginePhase::Resting
        } else {
            EnginePhase::SetActive
        };
        self.timer.running = true;
        tracing::info!("Resumed");
        vec![EngineEvent::Resumed { resting }]
    }

    /// Jump to a specific exercise and set.
    ///
    /// Completed sets are left as they are; a jump only moves the pointers
    /// and resets the timers. Out-of-range targets are rejected and leave the
    /// engine untouched.
    pub fn navigate_to(&mut self, exercise_index: usize, set_number: u32) -> Vec<EngineEvent> {
        if self.phase.is_terminal() {
            return vec![];
        }

        let in_range = self
            .exercises
            .get(exercise_index)
            .is_some_and(|e| (1..=e.total_sets).contains(&set_number));
        if !in_range {
            tracing::warn!(
                "Rejected navigation to exercise {} set {}",
                exercise_index,
                set_number
            );
            return vec![EngineEvent::NavigationRejected {
                exercise_index,
                set_number,
            }];
        }

        self.exercise_index = exercise_index;
        self.exercises[exercise_index].current_set = set_number;
        self.phase = EnginePhase::Idle;
        self.pending_rest_taken = None;
        self.rest_elapsed = 0;
        self.reset_timer();

        tracing::info!("Navigated to exercise {} set {}", exercise_index, set_number);
        vec![EngineEvent::Navigated {
            exercise_index,
            set_number,
        }]
    }

    /// Set the working weight for every remaining set of an exercise
    pub fn adjust_weight(&mut self, exercise_index: usize, weight: f64) -> Vec<EngineEvent> {
        if self.phase.is_terminal() {
            return vec![];
        }
        if !weight.is_finite() || weight < 0.0 {
            tracing::warn!("Rejected weight {} for exercise {}", weight, exercise_index);
            return vec![];
        }
        let Some(exercise) = self.exercises.get_mut(exercise_index) else {
            return vec![];
        };

        for set in exercise.sets.iter_mut().filter(|s| !s.completed) {
            set.weight = weight;
        }
        tracing::debug!("Weight for {} set to {}", exercise.exercise_id, weight);
        vec![EngineEvent::WeightChanged {
            exercise_index,
            weight,
        }]
    }

    /// Explicitly correct a completed set; points already awarded stand.
    pub fn correct_set(
        &mut self,
        exercise_index: usize,
        set_number: u32,
        performance: SetPerformance,
    ) -> Vec<EngineEvent> {
        let Some(record) = self
            .exercises
            .get_mut(exercise_index)
            .and_then(|e| e.set_mut(set_number))
            .filter(|r| r.completed)
        else {
            return vec![];
        };

        if let Some(reps) = performance.reps {
            record.actual_reps = Some(reps);
        }
        if let Some(weight) = performance.weight.filter(|w| w.is_finite() && *w >= 0.0) {
            record.weight = weight;
        }
        if let Some(rpe) = performance.rpe {
            record.rpe = Some(rpe.clamp(1, 10));
        }
        if performance.notes.is_some() {
            record.notes = performance.notes;
        }

        tracing::info!("Corrected exercise {} set {}", exercise_index, set_number);
        vec![EngineEvent::SetCorrected {
            exercise_index,
            record: record.clone(),
        }]
    }

    /// Stop the workout for good without completing it
    pub fn abandon(&mut self) -> Vec<EngineEvent> {
        if self.phase.is_terminal() {
            return vec![];
        }

        self.phase = EnginePhase::Abandoned;
        self.timer.running = false;
        self.timer.resting = false;
        tracing::info!("Session abandoned");

        self.aggregator
            .finish(SessionStatus::Abandoned, &self.exercises, &self.rewards)
            .map(|session| EngineEvent::WorkoutAbandoned {
                session: Box::new(session),
            })
            .into_iter()
            .collect()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn end_rest(&mut self) -> EngineEvent {
        self.phase = EnginePhase::Idle;
        self.timer.resting = false;
        self.timer.running = false;
        self.timer.countdown_remaining = 0;
        self.pending_rest_taken = Some(self.rest_elapsed);
        EngineEvent::RestCompleted {
            exercise_index: self.exercise_index,
            next_set: self.timer.current_set,
        }
    }

    /// Move to the next unfinished exercise, or finish the session
    fn advance_exercise(&mut self) -> Vec<EngineEvent> {
        let count = self.exercises.len();
        let next = (self.exercise_index + 1..count)
            .chain(0..self.exercise_index)
            .find(|&i| !self.exercises[i].completed);

        self.pending_rest_taken = None;
        self.rest_elapsed = 0;

        match next {
            Some(index) => {
                self.exercise_index = index;
                self.phase = EnginePhase::Idle;
                self.reset_timer();
                tracing::info!("Moving on to {}", self.exercises[index].name);
                vec![EngineEvent::ExerciseAdvanced {
                    exercise_index: index,
                }]
            }
            None => {
                self.phase = EnginePhase::Complete;
                self.timer.running = false;
                self.timer.resting = false;
                self.aggregator
                    .finish(SessionStatus::Completed, &self.exercises, &self.rewards)
                    .map(|session| EngineEvent::WorkoutCompleted {
                        session: Box::new(session),
                    })
                    .into_iter()
                    .collect()
            }
        }
    }

    fn reset_timer(&mut self) {
        let exercise = &self.exercises[self.exercise_index];
        self.timer = TimerState {
            current_set: exercise.current_set,
            total_sets: exercise.total_sets,
            rest_seconds: exercise.rest_seconds,
            ..TimerState::default()
        };
    }
}
