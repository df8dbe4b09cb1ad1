//! Windows backend.
//!
//! Uses an anonymous pipe for combined stdout/stderr and a blocking reader
//! thread. Output goes through the same bounded buffer as on POSIX.

use std::io::{PipeReader, Read, pipe};
use std::os::windows::process::CommandExt;
use std::process::{Child, Command, Stdio};

use tracing::{debug, error};

use crate::error::ProcessError;
use crate::output::PumpContext;
use crate::supervisor::Backend;
use crate::task::Task;

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub(crate) struct WindowsBackend;

impl Backend for WindowsBackend {
    type Source = PipeReader;

    const NAME: &'static str = "windows";
    const INTERRUPTIBLE: bool = false;

    fn spawn(&self, task: &Task) -> Result<(Child, PipeReader), ProcessError> {
        let (reader, writer) = pipe()?;

        let mut cmd = Command::new(&task.exec_name);
        cmd.args(&task.args)
            .current_dir(&task.work_dir)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::Spawn(format!("{}: {}", task.exec_name, e)))?;
        drop(cmd);

        Ok((child, reader))
    }

    fn terminate(&self, child: &mut Child) {
        let pid = child.id().to_string();
        let status = Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .creation_flags(CREATE_NO_WINDOW)
            .status();
        if !matches!(status, Ok(s) if s.success()) {
            debug!(pid = %pid, "taskkill failed, killing child only");
            if let Err(e) = child.kill() {
                debug!(pid = %pid, "kill failed: {}", e);
            }
        }
    }

    fn pump(mut source: PipeReader, ctx: PumpContext) {
        let mut buf = vec![0u8; ctx.chunk_size];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(_) if ctx.stopped() => break,
                Ok(n) => ctx.deliver(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                // Broken pipe is how a closed write end shows up here.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => break,
                Err(e) => {
                    error!(label = %ctx.label, "Output read failed: {}", e);
                    break;
                }
            }
        }
        debug!(label = %ctx.label, "Output reader finished");
    }
}
