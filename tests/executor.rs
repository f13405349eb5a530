#![cfg(unix)]

use porosim::exec::{run, RunnableProgram};
use std::path::Path;
use std::time::Duration;

#[test]
fn captures_streams_and_exit_code() {
    let program = RunnableProgram::with_args("sh", &["-c", "echo out; echo err >&2; exit 3"]);
    let result = run(Path::new("."), &program, None).expect("run");
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stdout.trim(), "out");
    assert_eq!(result.stderr.trim(), "err");
    assert!(!result.success());
}

#[test]
fn zero_exit_is_the_sole_success_signal() {
    let program = RunnableProgram::with_args("sh", &["-c", "exit 0"]);
    let result = run(Path::new("."), &program, None).expect("run");
    assert!(result.success());
}

#[test]
fn launch_failure_is_a_result_not_an_error() {
    let program = RunnableProgram::new("/nonexistent/solver");
    let result = run(Path::new("."), &program, None).expect("run");
    assert_eq!(result.exit_code, -1);
    assert!(result.stderr.contains("failed to launch"));
}

#[test]
fn deadline_kills_the_process_and_keeps_partial_output() {
    let program = RunnableProgram::with_args("sh", &["-c", "echo partial; exec sleep 30"]);
    let result = run(Path::new("."), &program, Some(Duration::from_millis(300))).expect("run");
    assert!(!result.success());
    assert_eq!(result.stdout.trim(), "partial");
    assert!(result.stderr.contains("deadline"));
    assert!(result.duration < Duration::from_secs(10));
}

#[test]
fn runs_in_the_given_working_directory() {
    let dir = std::env::temp_dir().join(format!("porosim-exec-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let program = RunnableProgram::with_args("sh", &["-c", "touch marker"]);
    let result = run(&dir, &program, None).expect("run");
    assert!(result.success());
    assert!(dir.join("marker").exists());
    let _ = std::fs::remove_dir_all(dir);
}
