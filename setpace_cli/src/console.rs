//! Terminal rendering of workout events and cues.

use setpace_core::cue::{CueKind, CuePort};
use setpace_core::reward::RewardFlags;
use setpace_core::{
    EngineEvent, Error, Result, SessionRecord, SetRecord, SetReward, WorkoutListener,
};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// The session handed back once the workout completes or is abandoned
pub type FinishedSlot = Rc<RefCell<Option<SessionRecord>>>;

/// Prints workout progress to stdout
pub struct ConsoleListener {
    exercise_names: Vec<String>,
    finished: FinishedSlot,
}

impl ConsoleListener {
    pub fn new(exercise_names: Vec<String>, finished: FinishedSlot) -> Self {
        Self {
            exercise_names,
            finished,
        }
    }

    fn name(&self, exercise_index: usize) -> &str {
        self.exercise_names
            .get(exercise_index)
            .map(String::as_str)
            .unwrap_or("?")
    }
}

impl WorkoutListener for ConsoleListener {
    fn on_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::SetStarted {
                exercise_index,
                set_number,
                ..
            } => println!("▶ {} set {}", self.name(*exercise_index), set_number),
            EngineEvent::RestStarted {
                duration_seconds, ..
            } => println!("  Rest {}", format_seconds(*duration_seconds)),
            EngineEvent::RestTick { remaining_seconds } if *remaining_seconds > 0 && *remaining_seconds <= 3 => {
                println!("  {}...", remaining_seconds)
            }
            EngineEvent::RestCompleted { next_set, .. } => {
                println!("  Rest over, set {} is up", next_set)
            }
            EngineEvent::RestSkipped { remaining_seconds } => {
                println!("  Rest skipped ({}s left)", remaining_seconds)
            }
            EngineEvent::ExerciseAdvanced { exercise_index } => {
                println!("\nNext: {}", self.name(*exercise_index))
            }
            EngineEvent::Paused { .. } => println!("  Paused"),
            EngineEvent::Resumed { .. } => println!("  Resumed"),
            EngineEvent::Navigated {
                exercise_index,
                set_number,
            } => println!("  Jumped to {} set {}", self.name(*exercise_index), set_number),
            EngineEvent::NavigationRejected {
                exercise_index,
                set_number,
            } => println!(
                "  No set {} in exercise {}",
                set_number,
                exercise_index + 1
            ),
            EngineEvent::SetCorrected { record, .. } => {
                println!("  Corrected set {}", record.set_number)
            }
            _ => {}
        }
    }

    fn on_set_complete(&self, exercise_index: usize, record: &SetRecord, reward: &SetReward) {
        let reps = record
            .actual_reps
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "✓ {} set {}: {} reps @ {}  +{} XP{}",
            self.name(exercise_index),
            record.set_number,
            reps,
            record.weight,
            reward.points,
            describe_flags(&reward.flags)
        );
    }

    fn on_exercise_complete(&self, exercise_id: &str) {
        println!("★ Finished {}", exercise_id);
    }

    fn on_workout_complete(&self, session: &SessionRecord) {
        *self.finished.borrow_mut() = Some(session.clone());
    }

    fn on_workout_abandoned(&self, session: &SessionRecord) {
        *self.finished.borrow_mut() = Some(session.clone());
    }

    fn on_weight_change(&self, exercise_index: usize, weight: f64) {
        println!("  {} weight set to {}", self.name(exercise_index), weight);
    }

    fn on_close(&self) {
        println!("Workout closed");
    }

    fn on_persist_error(&self, error: &Error) {
        eprintln!("Warning: session could not be saved: {}", error);
    }
}

fn describe_flags(flags: &RewardFlags) -> String {
    let labels: Vec<&str> = [
        (flags.target_hit, "target"),
        (flags.exceeded_target, "beat target"),
        (flags.optimal_intensity, "intensity"),
        (flags.perfect_rest, "rest"),
        (flags.personal_best, "PB!"),
    ]
    .into_iter()
    .filter_map(|(set, label)| set.then_some(label))
    .collect();

    if labels.is_empty() {
        String::new()
    } else {
        format!(" [{}]", labels.join(", "))
    }
}

pub fn format_seconds(seconds: u32) -> String {
    if seconds >= 60 {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Rings the terminal bell for the cues a terminal can express
pub struct TerminalBell;

impl CuePort for TerminalBell {
    fn play_cue(&mut self, cue: CueKind) -> Result<()> {
        let tone = cue.tone();
        tracing::debug!("Cue {:?} ({} Hz, {} ms)", cue, tone.frequency_hz, tone.duration_ms);

        let bells = match cue {
            CueKind::Countdown(_) => return Ok(()),
            CueKind::RestComplete => "\x07",
            CueKind::ExerciseComplete => "\x07\x07",
        };
        let mut out = io::stderr();
        out.write_all(bells.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| Error::Cue(format!("terminal bell failed: {}", e)))
    }
}
