//! Reward (XP) arithmetic for completed sets, exercises and sessions.
//!
//! Point values come from a [`RewardTable`] supplied by configuration; the
//! calculator itself holds no constants.

use crate::parser::RepRange;
use crate::{Error, Result, SetRecord};
use serde::{Deserialize, Serialize};

/// Rest taken within this many seconds of the target counts as perfect
pub const REST_TOLERANCE_SECONDS: u32 = 10;

/// Inclusive RPE band considered optimal intensity
pub const OPTIMAL_RPE: std::ops::RangeInclusive<u8> = 7..=8;

/// Point values for every reward the engine can award
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RewardTable {
    #[serde(default = "default_set_complete")]
    pub set_complete: u32,
    #[serde(default = "default_target_hit")]
    pub target_hit: u32,
    #[serde(default = "default_exceeded_target")]
    pub exceeded_target: u32,
    #[serde(default = "default_optimal_intensity")]
    pub optimal_intensity: u32,
    #[serde(default = "default_perfect_rest")]
    pub perfect_rest: u32,
    #[serde(default = "default_personal_best")]
    pub personal_best: u32,
    #[serde(default = "default_exercise_complete")]
    pub exercise_complete: u32,
    #[serde(default = "default_session_complete")]
    pub session_complete: u32,
    #[serde(default = "default_guided_mode")]
    pub guided_mode: u32,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            set_complete: default_set_complete(),
            target_hit: default_target_hit(),
            exceeded_target: default_exceeded_target(),
            optimal_intensity: default_optimal_intensity(),
            perfect_rest: default_perfect_rest(),
            personal_best: default_personal_best(),
            exercise_complete: default_exercise_complete(),
            session_complete: default_session_complete(),
            guided_mode: default_guided_mode(),
        }
    }
}

fn default_set_complete() -> u32 {
    10
}

fn default_target_hit() -> u32 {
    5
}

fn default_exceeded_target() -> u32 {
    10
}

fn default_optimal_intensity() -> u32 {
    5
}

fn default_perfect_rest() -> u32 {
    5
}

fn default_personal_best() -> u32 {
    25
}

fn default_exercise_complete() -> u32 {
    50
}

fn default_session_complete() -> u32 {
    100
}

fn default_guided_mode() -> u32 {
    25
}

impl RewardTable {
    /// Check the ordering the reward rules depend on
    pub fn validate(&self) -> Result<()> {
        if self.exceeded_target <= self.target_hit {
            return Err(Error::Config(format!(
                "exceeded_target ({}) must be larger than target_hit ({})",
                self.exceeded_target, self.target_hit
            )));
        }

        let largest_other = [
            self.set_complete,
            self.exceeded_target,
            self.optimal_intensity,
            self.perfect_rest,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        if self.personal_best <= largest_other {
            return Err(Error::Config(format!(
                "personal_best ({}) must be the largest set bonus (found {})",
                self.personal_best, largest_other
            )));
        }

        Ok(())
    }
}

/// Which bonuses a set earned
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardFlags {
    pub target_hit: bool,
    pub exceeded_target: bool,
    pub optimal_intensity: bool,
    pub perfect_rest: bool,
    pub personal_best: bool,
}

/// Points and flags for one completed set
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetReward {
    pub points: u32,
    pub flags: RewardFlags,
}

/// Facts about the exercise that the set record alone doesn't carry
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SetContext {
    pub target_rest_seconds: u32,
    /// Best weight recorded for this exercise before this set
    pub previous_best_weight: Option<f64>,
}

/// Compute points for a completed set.
///
/// Bonuses are independent and summed, except that exceeding the target's
/// upper bound replaces the target-hit bonus. Personal best requires a known
/// previous best; the first time an exercise is logged only establishes it.
pub fn compute_set_reward(record: &SetRecord, ctx: &SetContext, table: &RewardTable) -> SetReward {
    let mut flags = RewardFlags::default();
    let mut points = table.set_complete;

    if let (Some(reps), Some(range)) = (record.actual_reps, RepRange::parse(&record.target_reps)) {
        if reps > range.upper {
            flags.exceeded_target = true;
            points += table.exceeded_target;
        } else if range.contains(reps) {
            flags.target_hit = true;
            points += table.target_hit;
        }
    }

    if record.rpe.is_some_and(|rpe| OPTIMAL_RPE.contains(&rpe)) {
        flags.optimal_intensity = true;
        points += table.optimal_intensity;
    }

    if let Some(taken) = record.rest_taken_seconds {
        if taken.abs_diff(ctx.target_rest_seconds) <= REST_TOLERANCE_SECONDS {
            flags.perfect_rest = true;
            points += table.perfect_rest;
        }
    }

    if let Some(best) = ctx.previous_best_weight {
        if record.weight > best {
            flags.personal_best = true;
            points += table.personal_best;
        }
    }

    tracing::debug!(
        "Set {} reward: {} points ({:?})",
        record.set_number,
        points,
        flags
    );

    SetReward { points, flags }
}

/// Bonus for finishing a whole session, including the guided-mode bonus
pub fn session_completion_bonus(table: &RewardTable, guided: bool) -> u32 {
    if guided {
        table.session_complete + table.guided_mode
    } else {
        table.session_complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_set(reps: Option<u32>, rpe: Option<u8>, weight: f64) -> SetRecord {
        let mut record = SetRecord::planned(1, "8-10", weight);
        record.actual_reps = reps;
        record.rpe = rpe;
        record.completed = true;
        record
    }

    fn ctx() -> SetContext {
        SetContext {
            target_rest_seconds: 90,
            previous_best_weight: Some(100.0),
        }
    }

    #[test]
    fn test_base_points_only() {
        let table = RewardTable::default();
        let reward = compute_set_reward(&completed_set(Some(5), Some(9), 100.0), &ctx(), &table);
        assert_eq!(reward.points, table.set_complete);
        assert_eq!(reward.flags, RewardFlags::default());
    }

    #[test]
    fn test_target_hit_and_optimal_intensity() {
        let table = RewardTable::default();
        let reward = compute_set_reward(&completed_set(Some(9), Some(7), 100.0), &ctx(), &table);
        assert!(reward.flags.target_hit);
        assert!(reward.flags.optimal_intensity);
        assert!(!reward.flags.personal_best);
        assert_eq!(
            reward.points,
            table.set_complete + table.target_hit + table.optimal_intensity
        );
    }

    #[test]
    fn test_exceeded_target_excludes_target_hit() {
        let table = RewardTable::default();
        let reward = compute_set_reward(&completed_set(Some(12), Some(7), 100.0), &ctx(), &table);
        assert!(reward.flags.exceeded_target);
        assert!(!reward.flags.target_hit);
        assert_eq!(
            reward.points,
            table.set_complete + table.exceeded_target + table.optimal_intensity
        );
    }

    #[test]
    fn test_perfect_rest_tolerance() {
        let table = RewardTable::default();
        for (taken, expected) in [(80, true), (100, true), (79, false), (101, false)] {
            let mut record = completed_set(None, None, 100.0);
            record.rest_taken_seconds = Some(taken);
            let reward = compute_set_reward(&record, &ctx(), &table);
            assert_eq!(reward.flags.perfect_rest, expected, "rest taken {}", taken);
        }
    }

    #[test]
    fn test_personal_best_needs_strictly_heavier_weight() {
        let table = RewardTable::default();
        let heavier = compute_set_reward(&completed_set(None, None, 102.5), &ctx(), &table);
        assert!(heavier.flags.personal_best);
        assert_eq!(heavier.points, table.set_complete + table.personal_best);

        let equal = compute_set_reward(&completed_set(None, None, 100.0), &ctx(), &table);
        assert!(!equal.flags.personal_best);

        let first_time = SetContext {
            target_rest_seconds: 90,
            previous_best_weight: None,
        };
        let unknown = compute_set_reward(&completed_set(None, None, 500.0), &first_time, &table);
        assert!(!unknown.flags.personal_best);
    }

    #[test]
    fn test_unparseable_target_awards_no_rep_bonus() {
        let table = RewardTable::default();
        let mut record = completed_set(Some(30), None, 0.0);
        record.target_reps = "AMRAP".into();
        let reward = compute_set_reward(&record, &ctx(), &table);
        assert!(!reward.flags.target_hit);
        assert!(!reward.flags.exceeded_target);
    }

    #[test]
    fn test_rewards_follow_the_table() {
        let table = RewardTable {
            set_complete: 1,
            target_hit: 2,
            optimal_intensity: 4,
            ..RewardTable::default()
        };
        let reward = compute_set_reward(&completed_set(Some(8), Some(8), 100.0), &ctx(), &table);
        assert_eq!(reward.points, 7);
    }

    #[test]
    fn test_session_bonus() {
        let table = RewardTable::default();
        assert_eq!(session_completion_bonus(&table, false), table.session_complete);
        assert_eq!(
            session_completion_bonus(&table, true),
            table.session_complete + table.guided_mode
        );
    }

    #[test]
    fn test_validate_table() {
        assert!(RewardTable::default().validate().is_ok());

        let bad = RewardTable {
            exceeded_target: 3,
            ..RewardTable::default()
        };
        assert!(bad.validate().is_err());

        let weak_pb = RewardTable {
            personal_best: 10,
            ..RewardTable::default()
        };
        assert!(weak_pb.validate().is_err());
    }
}
