//! Queue errors.

use serde::Serialize;
use stq_process::ProcessError;
use thiserror::Error;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Caller passed something unusable (bad name, malformed task,
    /// the ID of the task being executed).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown task ID or queue name.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Queue name already taken.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// `start()` on a queue that is already running.
    #[error("Queue is already running")]
    AlreadyRunning,

    /// Operation needs a different queue state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Task ID counter exhausted.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Store file does not have the expected tables.
    #[error("Schema mismatch: {0}")]
    Schema(String),

    /// SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Process runner error.
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse result code for adapters (RPC, CLI) that only need a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    InvalidState,
    OutOfRange,
    OsError,
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::AlreadyRunning | Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            Self::Process(e) => match e {
                ProcessError::AlreadyRunning | ProcessError::InvalidState(_) => {
                    ErrorKind::InvalidState
                }
                ProcessError::InvalidTask(_) | ProcessError::UnsupportedBackend(_) => {
                    ErrorKind::InvalidArgument
                }
                _ => ErrorKind::OsError,
            },
            Self::Schema(_) | Self::Database(_) | Self::Io(_) => ErrorKind::OsError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueueError::NotFound("task 3".to_string());
        assert_eq!(err.to_string(), "Not found: task 3");
        assert!(QueueError::AlreadyRunning.to_string().contains("already running"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            QueueError::InvalidArgument("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(QueueError::AlreadyRunning.kind(), ErrorKind::InvalidState);
        assert_eq!(QueueError::OutOfRange("id".into()).kind(), ErrorKind::OutOfRange);
        assert_eq!(QueueError::Schema("bad".into()).kind(), ErrorKind::OsError);
        assert_eq!(
            QueueError::from(ProcessError::Spawn("enoent".into())).kind(),
            ErrorKind::OsError
        );
        assert_eq!(
            QueueError::from(ProcessError::InvalidTask("empty".into())).kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_from_rusqlite() {
        let err = QueueError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, QueueError::Database(_)));
        assert_eq!(err.kind(), ErrorKind::OsError);
    }
}
