//! Error types for the setpace_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for setpace_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workout plan validation error
    #[error("Plan error: {0}")]
    Plan(String),

    /// Secondary surface could not render or focus
    #[error("Surface error: {0}")]
    Surface(String),

    /// Audible/haptic cue could not be produced
    #[error("Cue error: {0}")]
    Cue(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
