//! A named queue: a store plus a runner plus the loop that drives them.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use stq_process::{ProcessRunner, Task};
use tracing::{error, info, warn};

use crate::config::QueueOptions;
use crate::error::QueueError;
use crate::store::{CurrentTask, QueueStore};

/// One durable queue that executes its pending tasks one at a time.
///
/// A queue is either idle or running. [`start`](Self::start) spawns a loop
/// thread that claims pending tasks in ID order, runs each to completion and
/// moves it to the finished set. The loop goes idle by itself once nothing is
/// pending, or when [`stop`](Self::stop) kills the active child.
pub struct Queue {
    name: String,
    store: Arc<QueueStore>,
    runner: Arc<dyn ProcessRunner>,
    current: CurrentTask,
    running: Arc<AtomicBool>,
    start_flag: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    options: QueueOptions,
}

impl Queue {
    /// Open the store for `name` under `root` and attach `runner`.
    pub fn open(
        root: &Path,
        name: &str,
        runner: Arc<dyn ProcessRunner>,
        options: QueueOptions,
    ) -> Result<Self, QueueError> {
        let current = CurrentTask::default();
        let store = QueueStore::open(root, name, Arc::clone(&current))?;
        Ok(Self {
            name: name.to_string(),
            store: Arc::new(store),
            runner,
            current,
            running: Arc::new(AtomicBool::new(false)),
            start_flag: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            options,
        })
    }

    /// Name the queue was opened under. Registry renames do not change it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    pub fn list_pending(&self) -> Result<Vec<u32>, QueueError> {
        self.store.list_pending()
    }

    pub fn list_finished(&self) -> Result<Vec<u32>, QueueError> {
        self.store.list_finished()
    }

    pub fn pending_details(&self, id: u32) -> Result<Task, QueueError> {
        self.store.pending_details(id)
    }

    pub fn finished_details(&self, id: u32) -> Result<Task, QueueError> {
        self.store.finished_details(id)
    }

    pub fn clear_pending(&self) -> Result<(), QueueError> {
        self.store.clear_pending()
    }

    pub fn clear_finished(&self) -> Result<(), QueueError> {
        self.store.clear_finished()
    }

    /// Add `task` to the pending set; its `id` is set on success.
    pub fn add_task(&self, task: &mut Task) -> Result<u32, QueueError> {
        self.store.add_task(task)
    }

    pub fn remove_task(&self, id: u32) -> Result<(), QueueError> {
        self.store.remove_task(id)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the executing task; `None` between two tasks.
    pub fn current_task(&self) -> Result<Option<Task>, QueueError> {
        if !self.is_running() {
            return Err(QueueError::InvalidState(format!("queue {} is not running", self.name)));
        }
        Ok(self.current.lock().clone())
    }

    /// Output of the executing task captured since the previous call.
    pub fn read_current_output(&self) -> Result<Vec<String>, QueueError> {
        if !self.is_running() {
            return Err(QueueError::InvalidState(format!("queue {} is not running", self.name)));
        }
        Ok(self.runner.read_current_output())
    }

    /// Start executing pending tasks in the background.
    pub fn start(&self) -> Result<(), QueueError> {
        let mut worker = self.worker.lock();
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(QueueError::AlreadyRunning);
        }
        // The previous loop already went idle on its own.
        if let Some(previous) = worker.take() {
            if previous.join().is_err() {
                error!(queue = %self.name, "Previous execution loop panicked");
            }
        }

        self.start_flag.store(true, Ordering::SeqCst);
        let exec = ExecLoop {
            name: self.name.clone(),
            store: Arc::clone(&self.store),
            runner: Arc::clone(&self.runner),
            running: Arc::clone(&self.running),
            start_flag: Arc::clone(&self.start_flag),
            poll_interval: self.options.poll_interval,
        };
        let spawned = thread::Builder::new()
            .name(format!("stq-queue-{}", self.name))
            .spawn(move || exec.run());
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                info!(queue = %self.name, "Queue started");
                Ok(())
            }
            Err(e) => {
                self.start_flag.store(false, Ordering::SeqCst);
                self.running.store(false, Ordering::SeqCst);
                Err(QueueError::Io(e))
            }
        }
    }

    /// Kill the active child, if any, and wait for the loop to exit.
    /// Does nothing on an idle queue.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        self.start_flag.store(false, Ordering::SeqCst);
        if self.is_running() {
            self.runner.stop();
        }
        if let Some(handle) = worker.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                error!(queue = %self.name, "Execution loop panicked");
                self.store.release();
            }
            info!(queue = %self.name, "Queue stopped");
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the loop thread.
struct ExecLoop {
    name: String,
    store: Arc<QueueStore>,
    runner: Arc<dyn ProcessRunner>,
    running: Arc<AtomicBool>,
    start_flag: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl ExecLoop {
    fn run(self) {
        while self.start_flag.load(Ordering::SeqCst) {
            let task = match self.store.claim_next() {
                Ok(Some(task)) => task,
                Ok(None) => {
                    info!(queue = %self.name, "No pending tasks, going idle");
                    break;
                }
                Err(e) => {
                    error!(queue = %self.name, "Failed to claim next task: {}", e);
                    break;
                }
            };

            let task = self.execute(task);
            if let Err(e) = self.store.finish(&task) {
                error!(queue = %self.name, task_id = task.id, "Failed to record task outcome: {}", e);
                self.store.release();
                break;
            }
        }
        self.start_flag.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn execute(&self, mut task: Task) -> Task {
        self.runner.init();
        if let Err(e) = self.runner.start(&task) {
            warn!(queue = %self.name, task_id = task.id, "Task failed to start: {}", e);
            task.fail(-1);
            return task;
        }

        while self.runner.is_running() {
            if !self.start_flag.load(Ordering::SeqCst) {
                self.runner.stop();
                break;
            }
            thread::park_timeout(self.poll_interval);
        }

        let code = self.runner.exit_code().unwrap_or_else(|e| {
            warn!(queue = %self.name, task_id = task.id, "No exit code: {}", e);
            -1
        });
        task.complete(code);
        info!(queue = %self.name, task_id = task.id, exit_code = code, "Task completed");
        task
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
