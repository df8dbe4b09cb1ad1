//! Pseudo-terminal backend.
//!
//! The child runs in a new session with the pty slave as its controlling
//! terminal, so tools that line-buffer or check `isatty` behave as they do
//! in a shell. Stdout and stderr both arrive on the master.

use std::fs::File;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use nix::pty::{Winsize, openpty};
use nix::sys::termios::Termios;
use nix::unistd::setsid;

use crate::error::ProcessError;
use crate::output::PumpContext;
use crate::supervisor::Backend;
use crate::task::Task;
use crate::unix;

const WINSIZE: Winsize = Winsize {
    ws_row: 24,
    ws_col: 80,
    ws_xpixel: 0,
    ws_ypixel: 0,
};

pub(crate) struct PtyBackend;

impl Backend for PtyBackend {
    type Source = File;

    const NAME: &'static str = "pty";
    const INTERRUPTIBLE: bool = true;

    fn spawn(&self, task: &Task) -> Result<(Child, File), ProcessError> {
        let pty = openpty(Some(&WINSIZE), None::<&Termios>)
            .map_err(|e| ProcessError::Spawn(format!("openpty: {e}")))?;
        unix::set_cloexec(&pty.master)?;
        unix::set_cloexec(&pty.slave)?;

        let mut cmd = Command::new(&task.exec_name);
        cmd.args(&task.args)
            .current_dir(&task.work_dir)
            .stdin(Stdio::from(pty.slave.try_clone()?))
            .stdout(Stdio::from(pty.slave.try_clone()?))
            .stderr(Stdio::from(pty.slave));

        // SAFETY: only async-signal-safe calls between fork and exec.
        unsafe {
            cmd.pre_exec(|| {
                setsid()?;
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::Spawn(format!("{}: {}", task.exec_name, e)))?;
        // `cmd` still owns the slave copies; they must close before the
        // master can report EIO at child exit.
        drop(cmd);

        Ok((child, File::from(pty.master)))
    }

    fn terminate(&self, child: &mut Child) {
        unix::kill_group(child);
    }

    fn pump(source: File, ctx: PumpContext) {
        unix::pump(source, ctx);
    }
}

#[cfg(test)]
#[path = "pty_tests.rs"]
mod tests;
