//! Task definitions.

use serde::{Deserialize, Serialize};

use crate::error::ProcessError;

/// One unit of work: an executable, its arguments and working directory,
/// plus the outcome once it has run.
///
/// `id` is meaningless until the task has been accepted by a queue.
/// `exit_code` and `is_success` are meaningless until the task is finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u32,
    pub exec_name: String,
    pub work_dir: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub is_success: bool,
}

impl Task {
    /// Create a task that runs `exec_name` inside `work_dir`.
    pub fn new(exec_name: impl Into<String>, work_dir: impl Into<String>) -> Self {
        Self {
            exec_name: exec_name.into(),
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Set the argument list (argv without the program name).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Record the outcome of a run.
    pub fn complete(&mut self, exit_code: i32) {
        self.exit_code = exit_code;
        self.is_success = exit_code == 0;
    }

    /// Record a run that never started or was cut short.
    pub fn fail(&mut self, exit_code: i32) {
        self.exit_code = exit_code;
        self.is_success = false;
    }

    /// Check that the task can be handed to a runner.
    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.exec_name.is_empty() {
            return Err(ProcessError::InvalidTask("empty executable name".to_string()));
        }
        if self.work_dir.is_empty() {
            return Err(ProcessError::InvalidTask("empty working directory".to_string()));
        }
        let has_nul = std::iter::once(&self.exec_name)
            .chain(std::iter::once(&self.work_dir))
            .chain(self.args.iter())
            .any(|s| s.contains('\0'));
        if has_nul {
            return Err(ProcessError::InvalidTask("string contains NUL byte".to_string()));
        }
        Ok(())
    }
}
