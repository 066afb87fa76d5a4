#![forbid(unsafe_code)]

//! Core domain model and timing logic for Setpace guided workouts.
//!
//! This crate provides:
//! - Set/rest text parsing and workout plans
//! - The set/rest timing engine and its events
//! - Reward (XP) calculation and session aggregation
//! - Cue selection, clock scheduling and secondary-surface mirroring
//! - The guided workout host tying those together
//! - Persistence (session log, CSV rollup, training state)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod parser;
pub mod plan;
pub mod reward;
pub mod events;
pub mod session;
pub mod engine;
pub mod cue;
pub mod clock;
pub mod surface;
pub mod workout;
pub mod wal;
pub mod csv_rollup;
pub mod state;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use events::EngineEvent;
pub use engine::TimingEngine;
pub use reward::{RewardTable, SetReward};
pub use session::{SessionAggregator, SessionTotals};
pub use clock::{EventLoop, ManualScheduler, Scheduler};
pub use cue::{CueKind, CuePort};
pub use surface::{SurfaceMode, SurfaceSynchronizer};
pub use workout::{GuidedWorkout, WorkoutListener, WorkoutOptions};
pub use wal::{JsonlSink, SessionSink};
