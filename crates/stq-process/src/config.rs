//! Runner configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ProcessError;

/// Which backend a runner uses to attach to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    /// Pseudo-terminal (POSIX only).
    Pty,
    /// Single pipe shared by stdout and stderr.
    Pipe,
}

impl Default for RunnerKind {
    fn default() -> Self {
        if cfg!(unix) { Self::Pty } else { Self::Pipe }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pty => write!(f, "pty"),
            Self::Pipe => write!(f, "pipe"),
        }
    }
}

impl FromStr for RunnerKind {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pty" => Ok(Self::Pty),
            "pipe" => Ok(Self::Pipe),
            other => Err(ProcessError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Runner tuning knobs.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Chunks kept before the oldest is dropped.
    pub output_capacity: usize,

    /// Maximum bytes per captured chunk.
    pub read_buffer_size: usize,

    /// Allow spawning while the effective user is root.
    pub allow_privileged: bool,

    /// Mirror every task's output into `<log_dir>/<label>-<id>.log`.
    pub log_dir: Option<PathBuf>,

    /// Name used in log files, thread names and tracing fields.
    pub label: String,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            output_capacity: 64,
            read_buffer_size: 4096,
            allow_privileged: false,
            log_dir: None,
            label: "task".to_string(),
        }
    }
}

impl RunnerOptions {
    /// Same options with a different label.
    pub fn labeled(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..self.clone()
        }
    }
}
