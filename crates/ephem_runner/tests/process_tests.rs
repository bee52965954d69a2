//! Tests for the process runner against real child processes.
//!
//! Tests skip themselves when `sh` is not available.

use ephem_runner::{CommandRunner, CommandSpec, ProcessRunner, RunnerError};
use tempfile::tempdir;

async fn shell_available(runner: &ProcessRunner) -> bool {
    let check = CommandSpec::new("sh").args(["-c", "exit 0"]);
    runner.run(&check).await.map(|r| r.success()).unwrap_or(false)
}

#[tokio::test]
async fn test_captures_stdout_and_exit_code() {
    let runner = ProcessRunner::new().ci_mode(false);
    if !shell_available(&runner).await {
        println!("sh not available, skipping test");
        return;
    }

    let spec = CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2; exit 3"]);
    let result = runner.run(&spec).await.unwrap();

    assert_eq!(result.exit_code, 3);
    assert!(!result.success());
    assert_eq!(result.stdout.trim(), "hello");
    assert_eq!(result.stderr.trim(), "oops");
    assert!(result.combined_output().contains("hello"));
    assert!(result.combined_output().contains("oops"));
}

#[tokio::test]
async fn test_env_and_workdir_are_applied() {
    let runner = ProcessRunner::new().ci_mode(false);
    if !shell_available(&runner).await {
        println!("sh not available, skipping test");
        return;
    }

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "present").unwrap();

    let spec = CommandSpec::new("sh")
        .args(["-c", "cat marker.txt; echo \" $EPHEM_TEST_VALUE\""])
        .workdir(dir.path())
        .env("EPHEM_TEST_VALUE", "from-env");
    let result = runner.run(&spec).await.unwrap();

    assert!(result.success());
    assert_eq!(result.stdout.trim(), "present from-env");
}

#[tokio::test]
async fn test_timeout_kills_child() {
    let runner = ProcessRunner::new().ci_mode(false);
    if !shell_available(&runner).await {
        println!("sh not available, skipping test");
        return;
    }

    let spec = CommandSpec::new("sh").args(["-c", "sleep 5"]).timeout(1);
    let err = runner.run(&spec).await.unwrap_err();
    assert!(matches!(err, RunnerError::Timeout(1)));
}

#[tokio::test]
async fn test_missing_program() {
    let runner = ProcessRunner::new();
    let spec = CommandSpec::new("ephem-definitely-not-installed");

    assert!(!runner.is_available("ephem-definitely-not-installed").await);
    let err = runner.run(&spec).await.unwrap_err();
    assert!(matches!(err, RunnerError::ProgramNotAvailable(_)));
}

#[tokio::test]
async fn test_missing_workdir_is_not_a_missing_program() {
    let runner = ProcessRunner::new();
    let dir = tempdir().unwrap();
    let missing = dir.path().join("not-created");
    let spec = CommandSpec::new("sh").args(["-c", "exit 0"]).workdir(&missing);

    let err = runner.run(&spec).await.unwrap_err();
    assert!(matches!(err, RunnerError::WorkdirMissing(ref p) if *p == missing));
    assert!(err.to_string().contains("not-created"));
}
