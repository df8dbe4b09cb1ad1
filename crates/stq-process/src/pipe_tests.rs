use super::*;
use crate::config::RunnerOptions;
use crate::runner::ProcessRunner;
use crate::supervisor::Supervisor;
use crate::test_support::{collect_until, options, wait_exit};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn runner_with(options: RunnerOptions) -> Supervisor<PipeBackend> {
    Supervisor::new(PipeBackend, options)
}

#[test]
fn test_stdout_and_stderr_combined() {
    let runner = runner_with(options());
    let task = Task::new("/bin/sh", "/tmp").with_args(["-c", "echo out; echo err 1>&2"]);
    runner.start(&task).unwrap();
    wait_exit(&runner);
    let output = collect_until(&runner, "err");

    assert!(output.contains("out"));
    assert!(output.contains("err"));
    assert_eq!(runner.exit_code().unwrap(), 0);
}

#[test]
fn test_buffer_keeps_newest_chunks() {
    let runner = runner_with(RunnerOptions {
        output_capacity: 3,
        read_buffer_size: 1,
        ..options()
    });
    runner
        .start(&Task::new("/bin/echo", "/tmp").arg("abcdef"))
        .unwrap();
    wait_exit(&runner);
    // Joins the reader once it has drained the pipe.
    runner.stop();

    assert_eq!(runner.read_current_output(), vec!["e", "f", "\n"]);
}

#[test]
fn test_stop_kills_process_group() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("survived");
    let script = format!("(sleep 2; touch {}) & sleep 30", marker.display());
    let runner = runner_with(options());
    runner
        .start(&Task::new("/bin/sh", "/tmp").with_args(["-c", script.as_str()]))
        .unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    runner.stop();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(runner.exit_code().unwrap() < 0);

    std::thread::sleep(Duration::from_secs(3));
    assert!(!marker.exists(), "background child outlived stop()");
}

#[test]
fn test_output_log_file() {
    let dir = TempDir::new().unwrap();
    let runner = runner_with(RunnerOptions {
        log_dir: Some(dir.path().join("out")),
        ..options().labeled("build")
    });
    let task = Task {
        id: 7,
        ..Task::new("/bin/echo", "/tmp").arg("logged line")
    };
    runner.start(&task).unwrap();
    wait_exit(&runner);
    runner.stop();

    let log = std::fs::read_to_string(dir.path().join("out").join("build-7.log")).unwrap();
    assert!(log.contains("logged line"));
}

#[test]
fn test_undrained_output_dropped_on_next_task_but_kept_in_log() {
    let dir = TempDir::new().unwrap();
    let runner = runner_with(RunnerOptions {
        log_dir: Some(dir.path().to_path_buf()),
        ..options().labeled("tail")
    });
    let first = Task {
        id: 1,
        ..Task::new("/bin/echo", "/tmp").arg("first tail")
    };
    runner.start(&first).unwrap();
    wait_exit(&runner);
    runner.stop();

    runner.init();
    assert!(runner.read_current_output().is_empty());

    let second = Task {
        id: 2,
        ..Task::new("/bin/echo", "/tmp").arg("second")
    };
    runner.start(&second).unwrap();
    wait_exit(&runner);
    let output = collect_until(&runner, "second");
    assert!(!output.contains("first tail"));

    let log = std::fs::read_to_string(dir.path().join("tail-1.log")).unwrap();
    assert!(log.contains("first tail"));
}

#[test]
fn test_invalid_task_rejected() {
    let runner = runner_with(options());
    assert!(matches!(
        runner.start(&Task::new("", "/tmp")),
        Err(ProcessError::InvalidTask(_))
    ));
}

#[test]
fn test_signal_exit_code() {
    let runner = runner_with(options());
    runner
        .start(&Task::new("/bin/sh", "/tmp").with_args(["-c", "kill -TERM $$"]))
        .unwrap();
    wait_exit(&runner);
    assert_eq!(runner.exit_code().unwrap(), -15);
}

#[test]
fn test_drop_kills_child() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("done");
    let script = format!("sleep 2; touch {}", marker.display());
    {
        let runner = runner_with(options());
        runner
            .start(&Task::new("/bin/sh", "/tmp").with_args(["-c", script.as_str()]))
            .unwrap();
    }
    std::thread::sleep(Duration::from_secs(3));
    assert!(!marker.exists());
}
