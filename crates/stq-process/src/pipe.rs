//! Pipe backend.
//!
//! One pipe carries both stdout and stderr. The child leads its own process
//! group so termination reaches everything it forked.

use std::io::{PipeReader, pipe};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use crate::error::ProcessError;
use crate::output::PumpContext;
use crate::supervisor::Backend;
use crate::task::Task;
use crate::unix;

pub(crate) struct PipeBackend;

impl Backend for PipeBackend {
    type Source = PipeReader;

    const NAME: &'static str = "pipe";
    const INTERRUPTIBLE: bool = true;

    fn spawn(&self, task: &Task) -> Result<(Child, PipeReader), ProcessError> {
        let (reader, writer) = pipe()?;

        let mut cmd = Command::new(&task.exec_name);
        cmd.args(&task.args)
            .current_dir(&task.work_dir)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::Spawn(format!("{}: {}", task.exec_name, e)))?;
        drop(cmd);

        Ok((child, reader))
    }

    fn terminate(&self, child: &mut Child) {
        unix::kill_group(child);
    }

    fn pump(source: PipeReader, ctx: PumpContext) {
        unix::pump(source, ctx);
    }
}

#[cfg(test)]
#[path = "pipe_tests.rs"]
mod tests;
