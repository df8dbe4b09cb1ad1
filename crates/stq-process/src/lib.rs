//! # stq process
//!
//! Child process supervision for the stq queue engine.
//!
//! A [`ProcessRunner`] runs one [`Task`] at a time, captures its combined
//! stdout/stderr into a bounded buffer and reports its exit status.
//!
//! ## Backends
//!
//! - `pty`: pseudo-terminal, POSIX only (default on Unix)
//! - `pipe`: single shared pipe; process-group kill on POSIX, tree kill on
//!   Windows (the only backend on Windows)
//!
//! All backends share one buffering contract: chunks are kept oldest-first
//! up to `output_capacity`, the oldest is dropped on overflow, and
//! [`ProcessRunner::read_current_output`] drains everything buffered.

pub mod config;
pub mod error;
pub mod runner;
pub mod task;

mod output;
mod supervisor;

#[cfg(unix)]
mod pipe;
#[cfg(unix)]
mod pty;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(all(test, unix))]
mod test_support;

use std::sync::Arc;

pub use config::{RunnerKind, RunnerOptions};
pub use error::ProcessError;
pub use runner::ProcessRunner;
pub use task::Task;

use supervisor::Supervisor;

/// Build a runner for `kind`.
///
/// Fails with [`ProcessError::UnsupportedBackend`] when the backend does
/// not exist on this platform.
pub fn create_runner(
    kind: RunnerKind,
    options: RunnerOptions,
) -> Result<Arc<dyn ProcessRunner>, ProcessError> {
    match kind {
        #[cfg(unix)]
        RunnerKind::Pty => Ok(Arc::new(Supervisor::new(pty::PtyBackend, options))),
        #[cfg(unix)]
        RunnerKind::Pipe => Ok(Arc::new(Supervisor::new(pipe::PipeBackend, options))),
        #[cfg(windows)]
        RunnerKind::Pipe => Ok(Arc::new(Supervisor::new(windows::WindowsBackend, options))),
        #[allow(unreachable_patterns)]
        other => Err(ProcessError::UnsupportedBackend(other.to_string())),
    }
}
