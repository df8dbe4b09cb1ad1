//! Backend-independent child supervision.

use std::process::{Child, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::RunnerOptions;
use crate::error::ProcessError;
use crate::output::{OutputBuffer, PumpContext};
use crate::runner::ProcessRunner;
use crate::task::Task;

/// How a platform attaches to, reads from and kills a child.
pub(crate) trait Backend: Send + Sync + 'static {
    /// Read end of the child's combined output.
    type Source: Send + 'static;

    const NAME: &'static str;

    /// Whether the reader observes the stop flag while waiting for output.
    /// Readers that block in the OS are detached instead of joined.
    const INTERRUPTIBLE: bool;

    fn spawn(&self, task: &Task) -> Result<(Child, Self::Source), ProcessError>;

    /// Kill the child and whatever it grouped with it. Must not wait.
    fn terminate(&self, child: &mut Child);

    /// Reader thread body. Returns at end of output or when `ctx` is stopped.
    fn pump(source: Self::Source, ctx: PumpContext);
}

struct RunState {
    child: Option<Child>,
    pid: Option<u32>,
    reader: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    exit: Option<i32>,
}

impl RunState {
    /// Reap the child if it has exited. Returns whether it is still alive.
    fn poll(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                let code = exit_code_of(status);
                debug!(pid = ?self.pid, code, "Child exited");
                self.exit = Some(code);
                self.child = None;
                false
            }
            Err(e) => {
                warn!(pid = ?self.pid, "Failed to poll child: {}", e);
                self.exit = Some(-1);
                self.child = None;
                false
            }
        }
    }

    /// Flag the reader to exit and hand back its handle for joining.
    fn retire_reader(&mut self) -> Option<JoinHandle<()>> {
        self.stop.store(true, Ordering::SeqCst);
        self.reader.take()
    }
}

fn join_reader<B: Backend>(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };
    if !B::INTERRUPTIBLE {
        debug!(backend = B::NAME, "Detaching output reader");
        return;
    }
    if handle.join().is_err() {
        warn!("Output reader thread panicked");
    }
}

#[cfg(unix)]
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// [`ProcessRunner`] implementation shared by every backend.
pub(crate) struct Supervisor<B: Backend> {
    backend: B,
    options: RunnerOptions,
    output: Arc<OutputBuffer>,
    state: Mutex<RunState>,
}

impl<B: Backend> Supervisor<B> {
    pub(crate) fn new(backend: B, options: RunnerOptions) -> Self {
        Self {
            backend,
            output: Arc::new(OutputBuffer::new(options.output_capacity)),
            options,
            state: Mutex::new(RunState {
                child: None,
                pid: None,
                reader: None,
                stop: Arc::new(AtomicBool::new(false)),
                exit: None,
            }),
        }
    }

    fn check_privileges(&self) -> Result<(), ProcessError> {
        #[cfg(unix)]
        if !self.options.allow_privileged && crate::unix::is_privileged() {
            return Err(ProcessError::PermissionDenied);
        }
        Ok(())
    }
}

impl<B: Backend> ProcessRunner for Supervisor<B> {
    fn init(&self) {
        let stale = {
            let mut state = self.state.lock();
            if state.poll() {
                warn!(label = %self.options.label, "init() called while a child is running, ignoring");
                return;
            }
            state.exit = None;
            state.pid = None;
            state.retire_reader()
        };
        join_reader::<B>(stale);
        self.output.reset();
    }

    fn start(&self, task: &Task) -> Result<(), ProcessError> {
        task.validate()?;
        self.check_privileges()?;

        let mut state = self.state.lock();
        if state.poll() {
            return Err(ProcessError::AlreadyRunning);
        }
        // Readers never take the state lock.
        join_reader::<B>(state.retire_reader());
        state.exit = None;

        self.output.reset();
        if let Some(dir) = &self.options.log_dir {
            self.output
                .attach_log(&dir.join(format!("{}-{}.log", self.options.label, task.id)));
        }

        let (mut child, source) = self.backend.spawn(task)?;
        let pid = child.id();

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = PumpContext {
            output: Arc::clone(&self.output),
            stop: Arc::clone(&stop),
            chunk_size: self.options.read_buffer_size.max(1),
            label: self.options.label.clone(),
        };
        let reader = thread::Builder::new()
            .name(format!("stq-{}-{}", B::NAME, self.options.label))
            .spawn(move || B::pump(source, ctx));
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                self.backend.terminate(&mut child);
                let _ = child.wait();
                return Err(ProcessError::Io(e));
            }
        };

        info!(
            label = %self.options.label,
            task_id = task.id,
            pid,
            backend = B::NAME,
            "Started {}",
            task.exec_name
        );
        state.child = Some(child);
        state.pid = Some(pid);
        state.reader = Some(reader);
        state.stop = stop;
        Ok(())
    }

    fn stop(&self) {
        let reader = {
            let mut state = self.state.lock();
            if let Some(mut child) = state.child.take() {
                self.backend.terminate(&mut child);
                let code = match child.wait() {
                    Ok(status) => exit_code_of(status),
                    Err(e) => {
                        warn!(pid = ?state.pid, "Failed to reap child: {}", e);
                        -1
                    }
                };
                info!(label = %self.options.label, pid = ?state.pid, code, "Stopped child");
                state.exit = Some(code);
            }
            state.retire_reader()
        };
        join_reader::<B>(reader);
    }

    fn is_running(&self) -> bool {
        self.state.lock().poll()
    }

    fn read_current_output(&self) -> Vec<String> {
        self.output.drain()
    }

    fn exit_code(&self) -> Result<i32, ProcessError> {
        let mut state = self.state.lock();
        if state.poll() {
            return Err(ProcessError::InvalidState("process is still running".to_string()));
        }
        state
            .exit
            .ok_or_else(|| ProcessError::InvalidState("no process has run".to_string()))
    }
}

impl<B: Backend> Drop for Supervisor<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
