//! POSIX helpers shared by the pty and pipe backends.

use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd};
use std::process::Child;

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, geteuid};
use tracing::{debug, error};

use crate::output::PumpContext;

/// Poll timeout; bounds how long a reader takes to notice the stop flag.
const POLL_INTERVAL_MS: u16 = 100;

pub(crate) fn is_privileged() -> bool {
    geteuid().is_root()
}

pub(crate) fn set_nonblocking(fd: &impl AsRawFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(raw, FcntlArg::F_GETFL)?);
    fcntl(raw, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

pub(crate) fn set_cloexec(fd: &impl AsRawFd) -> io::Result<()> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    Ok(())
}

/// SIGKILL the child's process group, falling back to the child alone.
pub(crate) fn kill_group(child: &mut Child) {
    let pid = Pid::from_raw(child.id() as i32);
    match killpg(pid, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => debug!(%pid, "Process group already gone"),
        Err(e) => {
            debug!(%pid, "killpg failed ({}), killing child only", e);
            if let Err(e) = child.kill() {
                debug!(%pid, "kill failed: {}", e);
            }
        }
    }
}

enum ReadOutcome {
    Data,
    Idle,
    Closed,
}

fn read_chunk<S: Read>(source: &mut S, buf: &mut [u8], ctx: &PumpContext) -> ReadOutcome {
    match source.read(buf) {
        Ok(0) => ReadOutcome::Closed,
        Ok(n) => {
            ctx.deliver(&buf[..n]);
            ReadOutcome::Data
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::Interrupted => {
            ReadOutcome::Idle
        }
        // A pty master reports EIO once every slave handle is closed.
        Err(e) if e.raw_os_error() == Some(libc::EIO) => ReadOutcome::Closed,
        Err(e) => {
            error!(label = %ctx.label, "Output read failed: {}", e);
            ReadOutcome::Closed
        }
    }
}

/// Reader loop for a non-blocking fd. Waits with `poll(2)` so the stop flag
/// is checked regularly; once stopped, drains what is already readable.
pub(crate) fn pump<S: Read + AsFd + AsRawFd>(mut source: S, ctx: PumpContext) {
    if let Err(e) = set_nonblocking(&source) {
        error!(label = %ctx.label, "Cannot make output fd non-blocking: {}", e);
        return;
    }
    let mut buf = vec![0u8; ctx.chunk_size];

    loop {
        if ctx.stopped() {
            while let ReadOutcome::Data = read_chunk(&mut source, &mut buf, &ctx) {}
            break;
        }

        let ready = {
            let mut fds = [PollFd::new(source.as_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS))
        };
        match ready {
            Ok(0) | Err(Errno::EINTR) => continue,
            Ok(_) => {}
            Err(e) => {
                error!(label = %ctx.label, "poll failed: {}", e);
                break;
            }
        }

        if let ReadOutcome::Closed = read_chunk(&mut source, &mut buf, &ctx) {
            break;
        }
    }
    debug!(label = %ctx.label, "Output reader finished");
}
