//! The process runner capability.

use crate::error::ProcessError;
use crate::task::Task;

/// Spawns, watches and captures output of one child process at a time.
///
/// All methods take `&self`; implementations synchronize internally so a
/// runner can be shared between a queue's execution loop and its callers.
pub trait ProcessRunner: Send + Sync {
    /// Reset transient state (buffered output, cached exit code, finished
    /// reader thread). Does nothing to a child that is still running.
    ///
    /// Output the caller has not drained yet is discarded here and again in
    /// [`start`](Self::start).
    fn init(&self);

    /// Spawn `task` with its working directory and argument list.
    ///
    /// Fails with [`ProcessError::AlreadyRunning`] while a child is active and,
    /// on POSIX backends, with [`ProcessError::PermissionDenied`] when running
    /// as root without the privileged opt-in.
    fn start(&self, task: &Task) -> Result<(), ProcessError>;

    /// Kill the child and its process group, reap it and join the reader.
    /// Safe to call at any time, any number of times.
    fn stop(&self);

    /// Non-blocking liveness check. Caches the exit status on first
    /// observation of termination.
    fn is_running(&self) -> bool;

    /// Drain output captured since the previous call, oldest chunk first.
    ///
    /// The buffer only holds the current (or last) child's output and is
    /// cleared when the next task starts. Callers that need every line of
    /// every task set `RunnerOptions::log_dir`, which receives all chunks
    /// including ones dropped from the buffer.
    fn read_current_output(&self) -> Vec<String>;

    /// Exit status of the last child: the exit code, or the negated signal
    /// number when it was killed by a signal.
    fn exit_code(&self) -> Result<i32, ProcessError>;
}
