//! Errors surfaced by the recording core.
//!
//! A sample level error only rejects the offending sample. Storage errors
//! leave the in-progress session untouched.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    /// The reading has unusable geometry. Only this sample is dropped.
    #[error("invalid sample: {reason}")]
    InvalidSample { reason: String },

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    /// The session was stopped but has nothing worth saving.
    #[error("not enough samples to save a track: got {point_count}, need at least {minimum}")]
    InsufficientData { point_count: usize, minimum: usize },

    /// Storage is unavailable or the write was refused.
    #[error("failed to persist tracks: {0:#}")]
    Persistence(anyhow::Error),

    /// The stored collection cannot be read back.
    #[error("stored tracks are corrupted: {reason}")]
    CorruptData { reason: String },

    #[error("location source unavailable: {reason}")]
    LocationUnavailable { reason: String },
}

impl TrackError {
    pub fn invalid_sample(reason: impl Into<String>) -> Self {
        TrackError::InvalidSample {
            reason: reason.into(),
        }
    }

    pub fn corrupt_data(reason: impl ToString) -> Self {
        TrackError::CorruptData {
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for TrackError {
    fn from(error: rusqlite::Error) -> Self {
        TrackError::Persistence(error.into())
    }
}

pub type Result<T> = std::result::Result<T, TrackError>;
