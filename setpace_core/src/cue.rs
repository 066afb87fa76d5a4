//! Mapping of engine events to audible/haptic cues.
//!
//! The mapping is stateless. Playback goes through a [`CuePort`] and any
//! failure is logged and dropped; the engine never depends on a cue landing.

use crate::{EngineEvent, Result};
use serde::{Deserialize, Serialize};

/// Remaining rest seconds at which a countdown cue fires
pub const REST_CUE_POINTS: [u32; 5] = [10, 5, 3, 2, 1];

/// Kind of cue requested by the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    /// Rest countdown crossed one of [`REST_CUE_POINTS`]
    Countdown(u32),
    RestComplete,
    ExerciseComplete,
}

/// A tone description for ports that synthesize sound
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

impl CueKind {
    /// Short tones rising in pitch towards zero, then two longer distinct tones
    pub fn tone(&self) -> Tone {
        match self {
            CueKind::Countdown(remaining) => {
                let frequency_hz = match remaining {
                    1 => 659,
                    2 => 587,
                    3 => 523,
                    4..=5 => 494,
                    _ => 440,
                };
                Tone {
                    frequency_hz,
                    duration_ms: 150,
                }
            }
            CueKind::RestComplete => Tone {
                frequency_hz: 880,
                duration_ms: 400,
            },
            CueKind::ExerciseComplete => Tone {
                frequency_hz: 1047,
                duration_ms: 700,
            },
        }
    }
}

/// Cue requested by a single engine event, if any
pub fn cue_for(event: &EngineEvent) -> Option<CueKind> {
    match event {
        EngineEvent::RestTick { remaining_seconds } if REST_CUE_POINTS.contains(remaining_seconds) => {
            Some(CueKind::Countdown(*remaining_seconds))
        }
        EngineEvent::RestCompleted { .. } => Some(CueKind::RestComplete),
        EngineEvent::ExerciseCompleted { .. } => Some(CueKind::ExerciseComplete),
        _ => None,
    }
}

/// Output capability for cues (speaker, terminal bell, vibration motor...)
pub trait CuePort {
    fn play_cue(&mut self, cue: CueKind) -> Result<()>;
}

/// Port for headless hosts and tests
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCuePort;

impl CuePort for NoopCuePort {
    fn play_cue(&mut self, _cue: CueKind) -> Result<()> {
        Ok(())
    }
}

/// Play the cue for `event` through `port`, swallowing playback failures.
///
/// Returns the cue that was requested, whether or not it could be played.
pub fn deliver(port: &mut dyn CuePort, event: &EngineEvent) -> Option<CueKind> {
    let cue = cue_for(event)?;
    if let Err(e) = port.play_cue(cue) {
        tracing::debug!("Cue {:?} could not be played: {}", cue, e);
    }
    Some(cue)
}
