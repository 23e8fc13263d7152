// Error types for the playback engine
// Every failure carries a kind so callers can branch without parsing messages

use std::path::PathBuf;
use thiserror::Error;

/// Broad category of a [`PlayerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad index, volume or seek target supplied by the caller
    Validation,
    /// Missing file, unknown format, undecodable data
    Resource,
    /// The audio output or the engine itself misbehaved
    Engine,
    /// Snapshot storage failed
    Persistence,
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("index {index} out of range (playlist has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid volume {0}: must be between 0.0 and 1.0")]
    InvalidVolume(f32),

    #[error("invalid seek target {target}s (duration {duration}s)")]
    InvalidSeek { target: f64, duration: f64 },

    #[error("nothing loaded")]
    NothingLoaded,

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("audio output failed: {0}")]
    Output(String),

    #[error("state storage failed: {0}")]
    Storage(String),

    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no tokio runtime available")]
    NoRuntime,
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::IndexOutOfRange { .. }
            | PlayerError::InvalidVolume(_)
            | PlayerError::InvalidSeek { .. } => ErrorKind::Validation,
            PlayerError::UnsupportedFormat(_)
            | PlayerError::FileNotFound(_)
            | PlayerError::Decode(_) => ErrorKind::Resource,
            PlayerError::NothingLoaded | PlayerError::Output(_) | PlayerError::NoRuntime => {
                ErrorKind::Engine
            }
            PlayerError::Storage(_) | PlayerError::Serialization(_) => ErrorKind::Persistence,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
