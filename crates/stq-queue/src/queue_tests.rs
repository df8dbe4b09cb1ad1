use super::*;
use std::sync::atomic::AtomicI32;
use std::time::Instant;
use stq_process::ProcessError;
use tempfile::TempDir;

/// Runner whose behaviour is picked by the task's executable name:
/// `exit:N` finishes at once with code N, `hang` runs until stopped,
/// `fail-spawn` refuses to start.
#[derive(Default)]
struct FakeRunner {
    alive: AtomicBool,
    exit: AtomicI32,
    has_exit: AtomicBool,
    started: Mutex<Vec<u32>>,
    output: Mutex<Vec<String>>,
}

impl ProcessRunner for FakeRunner {
    fn init(&self) {
        self.has_exit.store(false, Ordering::SeqCst);
        self.output.lock().clear();
    }

    fn start(&self, task: &Task) -> Result<(), ProcessError> {
        if self.alive.load(Ordering::SeqCst) {
            return Err(ProcessError::AlreadyRunning);
        }
        if task.exec_name == "fail-spawn" {
            return Err(ProcessError::Spawn("no such file".to_string()));
        }
        self.started.lock().push(task.id);
        self.output.lock().push(format!("running {}", task.id));
        if task.exec_name == "hang" {
            self.alive.store(true, Ordering::SeqCst);
        } else {
            let code = task
                .exec_name
                .strip_prefix("exit:")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            self.exit.store(code, Ordering::SeqCst);
            self.has_exit.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn stop(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.exit.store(-9, Ordering::SeqCst);
            self.has_exit.store(true, Ordering::SeqCst);
        }
    }

    fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn read_current_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.output.lock())
    }

    fn exit_code(&self) -> Result<i32, ProcessError> {
        if self.is_running() || !self.has_exit.load(Ordering::SeqCst) {
            return Err(ProcessError::InvalidState("no exit code".to_string()));
        }
        Ok(self.exit.load(Ordering::SeqCst))
    }
}

fn fast() -> QueueOptions {
    QueueOptions {
        poll_interval: Duration::from_millis(10),
    }
}

fn fake_queue(dir: &TempDir) -> (Queue, Arc<FakeRunner>) {
    let runner = Arc::new(FakeRunner::default());
    let queue = Queue::open(dir.path(), "q", runner.clone(), fast()).unwrap();
    (queue, runner)
}

fn task(exec: &str) -> Task {
    Task::new(exec, "/tmp")
}

fn wait_idle(queue: &Queue) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while queue.is_running() {
        assert!(Instant::now() < deadline, "queue did not go idle");
        thread::sleep(Duration::from_millis(10));
    }
}

fn wait_current(queue: &Queue, id: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(Some(task)) = queue.current_task() {
            if task.id == id {
                return;
            }
        }
        assert!(Instant::now() < deadline, "task {id} never became current");
        thread::sleep(Duration::from_millis(10));
    }
}

fn wait_started(runner: &FakeRunner) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !runner.is_running() {
        assert!(Instant::now() < deadline, "runner never started");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_runs_all_pending_in_order() {
    let dir = TempDir::new().unwrap();
    let (queue, runner) = fake_queue(&dir);
    queue.add_task(&mut task("exit:0")).unwrap();
    queue.add_task(&mut task("exit:2")).unwrap();

    queue.start().unwrap();
    wait_idle(&queue);

    assert_eq!(*runner.started.lock(), vec![0, 1]);
    assert!(queue.list_pending().unwrap().is_empty());
    assert_eq!(queue.list_finished().unwrap(), vec![0, 1]);

    let ok = queue.finished_details(0).unwrap();
    assert!(ok.is_success);
    assert_eq!(ok.exit_code, 0);
    let failed = queue.finished_details(1).unwrap();
    assert!(!failed.is_success);
    assert_eq!(failed.exit_code, 2);
}

#[test]
fn test_start_on_empty_queue_goes_idle() {
    let dir = TempDir::new().unwrap();
    let (queue, _) = fake_queue(&dir);
    queue.start().unwrap();
    wait_idle(&queue);
    assert!(queue.list_finished().unwrap().is_empty());
}

#[test]
fn test_spawn_failure_recorded_and_loop_continues() {
    let dir = TempDir::new().unwrap();
    let (queue, _) = fake_queue(&dir);
    queue.add_task(&mut task("fail-spawn")).unwrap();
    queue.add_task(&mut task("exit:0")).unwrap();

    queue.start().unwrap();
    wait_idle(&queue);

    let failed = queue.finished_details(0).unwrap();
    assert!(!failed.is_success);
    assert_eq!(failed.exit_code, -1);
    assert!(queue.finished_details(1).unwrap().is_success);
}

#[test]
fn test_already_running_and_stop() {
    let dir = TempDir::new().unwrap();
    let (queue, runner) = fake_queue(&dir);
    queue.add_task(&mut task("hang")).unwrap();
    queue.add_task(&mut task("exit:0")).unwrap();

    queue.start().unwrap();
    assert!(queue.is_running());
    assert!(matches!(queue.start(), Err(QueueError::AlreadyRunning)));
    wait_current(&queue, 0);

    queue.stop();
    assert!(!queue.is_running());
    assert!(!runner.is_running());

    // The killed task is recorded, the next one stays pending.
    let killed = queue.finished_details(0).unwrap();
    assert!(!killed.is_success);
    assert_eq!(killed.exit_code, -9);
    assert_eq!(queue.list_pending().unwrap(), vec![1]);
}

#[test]
fn test_stop_idle_is_noop() {
    let dir = TempDir::new().unwrap();
    let (queue, _) = fake_queue(&dir);
    queue.stop();
    queue.stop();
    assert!(!queue.is_running());
}

#[test]
fn test_idle_queue_rejects_live_queries() {
    let dir = TempDir::new().unwrap();
    let (queue, _) = fake_queue(&dir);
    assert!(matches!(queue.current_task(), Err(QueueError::InvalidState(_))));
    assert!(matches!(
        queue.read_current_output(),
        Err(QueueError::InvalidState(_))
    ));
}

#[test]
fn test_in_flight_task_is_protected() {
    let dir = TempDir::new().unwrap();
    let (queue, runner) = fake_queue(&dir);
    queue.add_task(&mut task("hang")).unwrap();
    queue.start().unwrap();
    wait_current(&queue, 0);
    wait_started(&runner);

    assert!(matches!(
        queue.remove_task(0),
        Err(QueueError::InvalidArgument(_))
    ));
    assert!(matches!(
        queue.clear_pending(),
        Err(QueueError::InvalidState(_))
    ));
    assert_eq!(queue.list_pending().unwrap(), vec![0]);

    // Other pending tasks can still be removed.
    queue.add_task(&mut task("exit:0")).unwrap();
    queue.remove_task(1).unwrap();

    assert_eq!(queue.read_current_output().unwrap(), vec!["running 0"]);
    assert!(queue.read_current_output().unwrap().is_empty());

    queue.stop();
    queue.clear_pending().unwrap();
}

#[test]
fn test_restart_after_idle() {
    let dir = TempDir::new().unwrap();
    let (queue, runner) = fake_queue(&dir);
    queue.add_task(&mut task("exit:0")).unwrap();
    queue.start().unwrap();
    wait_idle(&queue);

    queue.add_task(&mut task("exit:0")).unwrap();
    queue.start().unwrap();
    wait_idle(&queue);

    assert_eq!(*runner.started.lock(), vec![0, 1]);
    assert_eq!(queue.list_finished().unwrap(), vec![0, 1]);
}

#[test]
fn test_drop_stops_loop() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(FakeRunner::default());
    {
        let queue = Queue::open(dir.path(), "q", runner.clone(), fast()).unwrap();
        queue.add_task(&mut task("hang")).unwrap();
        queue.start().unwrap();
        wait_current(&queue, 0);
    }
    assert!(!runner.is_running());
}

#[cfg(unix)]
mod real_process {
    use super::*;
    use stq_process::{RunnerKind, RunnerOptions, create_runner};

    fn queue(dir: &TempDir, kind: RunnerKind) -> Queue {
        let runner = create_runner(
            kind,
            RunnerOptions {
                allow_privileged: true,
                ..Default::default()
            },
        )
        .unwrap();
        Queue::open(dir.path(), "real", runner, fast()).unwrap()
    }

    #[test]
    fn test_live_output_while_running() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir, RunnerKind::Pipe);
        queue
            .add_task(&mut Task::new("/bin/sh", "/tmp").with_args(["-c", "echo live-line; sleep 2"]))
            .unwrap();
        queue.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = String::new();
        while !seen.contains("live-line") && Instant::now() < deadline {
            if let Ok(chunks) = queue.read_current_output() {
                seen.extend(chunks);
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(seen.contains("live-line"), "saw {seen:?}");

        wait_idle(&queue);
        assert!(queue.finished_details(0).unwrap().is_success);
    }

    #[test]
    fn test_stop_kills_real_child() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir, RunnerKind::Pty);
        queue
            .add_task(&mut Task::new("/bin/sleep", "/tmp").arg("30"))
            .unwrap();
        queue.start().unwrap();
        wait_current(&queue, 0);

        let started = Instant::now();
        queue.stop();
        assert!(started.elapsed() < Duration::from_secs(5));

        let task = queue.finished_details(0).unwrap();
        assert!(!task.is_success);
        assert!(task.exit_code < 0);
    }
}
