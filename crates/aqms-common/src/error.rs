//! Error types for epoch handling.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias using EpochError.
pub type EpochResult<T> = Result<T, EpochError>;

/// Errors raised when constructing or parsing epochs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EpochError {
    #[error("Zero-length epoch starting at {0}")]
    ZeroLength(DateTime<Utc>),

    #[error("Epoch end {end} precedes start {start}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
