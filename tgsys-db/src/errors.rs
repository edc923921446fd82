//! Storage-level error types.

// Layer 1: Standard library
use std::io;

// Layer 2: Third-party
use thiserror::Error;

// Layer 3: Internal
use tgsys_utils::CoreError;

/// Errors surfaced by the storage layer.
#[derive(Error, Debug)]
pub enum DbError {
    /// Underlying file system failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The on-disk data does not decode; `offset` is the first bad byte.
    #[error("Database is corrupted at offset {offset}: {reason}")]
    Corrupted { offset: u64, reason: String },

    /// The store is encrypted and the supplied key does not open it.
    #[error("Wrong database key")]
    WrongKey,

    /// An event id moved backwards.
    #[error("Non-monotonic event id {got}, expected at least {expected}")]
    NonMonotonicEventId { got: u64, expected: u64 },

    /// Underlying SQL engine failure.
    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A rekey was requested while another one is running.
    #[error("Key change already in progress")]
    KeyChangeInProgress,

    /// Operation on a closed store.
    #[error("Database is closed")]
    Closed,

    /// The replay callback rejected an event; the file is left unchanged.
    #[error("Replay aborted: {0}")]
    ReplayAborted(CoreError),
}

impl DbError {
    /// Check whether this failure means the supplied key is wrong (the
    /// caller may retry with another key).
    pub fn is_wrong_key(&self) -> bool {
        matches!(self, DbError::WrongKey)
    }

    pub(crate) fn corrupted(offset: u64, reason: impl Into<String>) -> Self {
        DbError::Corrupted {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::WrongKey => CoreError::bad_request(err.to_string()),
            DbError::ReplayAborted(cause) => {
                CoreError::state("Replay aborted").with_cause(cause)
            }
            other => CoreError::state(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_key_classification() {
        assert!(DbError::WrongKey.is_wrong_key());
        assert!(!DbError::Closed.is_wrong_key());
    }

    #[test]
    fn test_corrupted_display() {
        let err = DbError::corrupted(96, "bad checksum");
        assert!(err.to_string().contains("96"));
        assert!(err.to_string().contains("bad checksum"));
    }

    #[test]
    fn test_core_error_conversion() {
        let err: CoreError = DbError::WrongKey.into();
        assert!(err.is_caller_error());

        let err: CoreError = DbError::Closed.into();
        assert!(err.is_state_error());

        let cause = CoreError::internal("schema too new");
        let err: CoreError = DbError::ReplayAborted(cause).into();
        assert!(err.cause.is_some());
    }
}
