//! Error types for the hearing screening core.
//!
//! A single error enum covers every failure the engine, store, renderer and
//! configuration layer can report to the front end. Stale responses are not
//! errors: the engine answers them with [`crate::engine::Step::Ignored`].

use thiserror::Error;

/// Main error type for the hearing screening core
#[derive(Error, Debug)]
pub enum ScreeningError {
    /// The tone synthesizer could not initialize or start a tone.
    /// The engine is back in `Idle` when this is returned.
    #[error("Playback failure: {0}")]
    PlaybackFailure(String),

    /// Operation requested from a phase that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A frequency that is not part of the configured test sequence
    #[error("Unknown frequency: {0} Hz")]
    UnknownFrequency(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the hearing screening core
pub type Result<T> = std::result::Result<T, ScreeningError>;
