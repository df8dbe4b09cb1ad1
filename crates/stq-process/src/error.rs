//! Process runner errors.

use thiserror::Error;

/// Process runner error types.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A child is already active on this runner.
    #[error("Process already running")]
    AlreadyRunning,

    /// Refusing to spawn while running with root privileges.
    #[error("Refusing to run tasks with root privileges")]
    PermissionDenied,

    /// Operation not valid in the current runner state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Task cannot be spawned as described.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// The OS refused to create the child.
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    /// Backend not available on this platform.
    #[error("Unsupported runner backend: {0}")]
    UnsupportedBackend(String),

    /// I/O error while setting up the child's channels.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
