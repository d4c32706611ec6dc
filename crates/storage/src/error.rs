//! Store error types.

use thiserror::Error;

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    /// The transaction lost a serialization race with another writer.
    /// The whole unit of work may be retried.
    #[error("Concurrent modification detected; the unit of work was rolled back")]
    ConcurrentModification,

    #[error("Row already exists: {0}")]
    Duplicate(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            match db.code().as_deref() {
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => return StoreError::ConcurrentModification,
                // unique_violation
                Some("23505") => return StoreError::Duplicate(db.message().to_string()),
                _ => {}
            }
        }
        StoreError::Database(err.to_string())
    }
}
