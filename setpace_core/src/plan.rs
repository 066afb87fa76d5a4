//! Workout plans handed in by the program catalog.
//!
//! Plans are plain TOML:
//!
//! ```toml
//! program_id = "strength_base"
//! day_name = "Lower A"
//! week_number = 2
//! phase_name = "Accumulation"
//!
//! [[exercises]]
//! id = "squat"
//! name = "Squat"
//! sets = "3 x 8-10"
//! rest = "90 sec"
//! starting_weight = 100.0
//! ```

use crate::parser::{parse_rest_time, parse_set_count, target_reps_from_sets, MAX_SET_COUNT};
use crate::{Error, ExerciseDefinition, ExerciseProgress, Result, SetRecord, WorkoutPlan};
use std::collections::HashSet;
use std::path::Path;

impl WorkoutPlan {
    /// Load a plan from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let plan = Self::from_toml(&contents)?;
        tracing::info!("Loaded plan {:?} from {:?}", plan.day_name, path);
        Ok(plan)
    }

    /// Parse and validate a plan from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let plan: WorkoutPlan = toml::from_str(contents)?;
        plan.validate()?;
        Ok(plan)
    }

    /// A plan needs at least one exercise and unique exercise ids
    pub fn validate(&self) -> Result<()> {
        if self.exercises.is_empty() {
            return Err(Error::Plan(format!(
                "plan {:?} has no exercises",
                self.day_name
            )));
        }

        let mut seen = HashSet::new();
        for exercise in &self.exercises {
            if exercise.id.trim().is_empty() {
                return Err(Error::Plan(format!(
                    "exercise {:?} has an empty id",
                    exercise.name
                )));
            }
            if !seen.insert(exercise.id.as_str()) {
                return Err(Error::Plan(format!(
                    "duplicate exercise id {:?}",
                    exercise.id
                )));
            }
            let sets = parse_set_count(&exercise.sets);
            if sets > MAX_SET_COUNT {
                return Err(Error::Plan(format!(
                    "exercise {:?} plans {} sets (at most {})",
                    exercise.id, sets, MAX_SET_COUNT
                )));
            }
            if exercise.starting_weight.is_some_and(|w| !w.is_finite() || w < 0.0) {
                return Err(Error::Plan(format!(
                    "exercise {:?} has an invalid starting weight",
                    exercise.id
                )));
            }
        }

        Ok(())
    }

    /// Fresh progress entries for every exercise, parsed from the plan text
    pub fn build_progress(&self) -> Vec<ExerciseProgress> {
        self.exercises.iter().map(ExerciseDefinition::to_progress).collect()
    }
}

impl ExerciseDefinition {
    /// Seed an [`ExerciseProgress`] with planned sets
    pub fn to_progress(&self) -> ExerciseProgress {
        let total_sets = parse_set_count(&self.sets).min(MAX_SET_COUNT);
        let rest_seconds = parse_rest_time(&self.rest);
        let target = target_reps_from_sets(&self.sets);
        let weight = self.starting_weight.unwrap_or(0.0);

        tracing::debug!(
            "Exercise {}: {} sets of {:?}, {}s rest",
            self.id,
            total_sets,
            target,
            rest_seconds
        );

        ExerciseProgress {
            exercise_id: self.id.clone(),
            name: self.name.clone(),
            total_sets,
            rest_seconds,
            sets: (1..=total_sets)
                .map(|n| SetRecord::planned(n, &target, weight))
                .collect(),
            current_set: 1,
            completed: false,
            started_at: None,
            completed_at: None,
        }
    }
}
