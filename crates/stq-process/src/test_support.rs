//! Helpers for runner tests.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::RunnerOptions;
use crate::runner::ProcessRunner;

/// Options that work when the test suite runs as root.
pub(crate) fn options() -> RunnerOptions {
    RunnerOptions {
        allow_privileged: true,
        ..Default::default()
    }
}

pub(crate) fn wait_exit(runner: &dyn ProcessRunner) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while runner.is_running() {
        assert!(Instant::now() < deadline, "child did not exit in time");
        thread::sleep(Duration::from_millis(20));
    }
}

/// Drain output until it contains `needle` or five seconds pass.
pub(crate) fn collect_until(runner: &dyn ProcessRunner, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut collected = String::new();
    loop {
        collected.extend(runner.read_current_output());
        if collected.contains(needle) || Instant::now() >= deadline {
            return collected;
        }
        thread::sleep(Duration::from_millis(20));
    }
}
