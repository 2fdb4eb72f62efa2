//! Error types for Reverie.
//!
//! Only data loading and the level model can fail. Playback itself degrades
//! to silence instead of returning errors.

use thiserror::Error;

use crate::ids::LevelId;

/// Top-level error type for Reverie operations.
#[derive(Debug, Error)]
pub enum ReverieError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data file could not be parsed
    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        /// File path, or `<inline>` for in-memory data
        source_name: String,
        /// Parser message
        message: String,
    },

    /// Two catalog entries share an id
    #[error("Duplicate sound id '{0}'")]
    DuplicateSound(String),

    /// Two levels share an id
    #[error("Duplicate level {0}")]
    DuplicateLevel(LevelId),

    /// Level is not registered with the level model
    #[error("Unknown level {0}")]
    UnknownLevel(LevelId),

    /// Output device could not be opened
    #[error("Failed to initialize audio device: {0}")]
    Device(String),
}

impl ReverieError {
    /// Builds a parse error for the given source.
    pub fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for Reverie operations.
pub type ReverieResult<T> = Result<T, ReverieError>;
