//! Mock command runner for testing.
//!
//! Provides a configurable mock implementation of the CommandRunner trait
//! for use in unit tests without requiring git or terraform.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Predefined mock response for a command execution.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 100,
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 100,
        }
    }

    pub fn with_exit_code(mut self, exit_code: i64) -> Self {
        self.exit_code = exit_code;
        self
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub workdir: Option<PathBuf>,
}

impl CapturedCall {
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// A response bound to a program and subcommand.
#[derive(Debug, Clone)]
struct ResponseRule {
    program: String,
    subcommand: String,
    response: MockResponse,
}

/// Mock command runner for testing.
///
/// Responses are looked up first by `(program, subcommand)` rules, then
/// taken from a rotating queue; with neither, every call succeeds with
/// empty output.
#[derive(Clone, Default)]
pub struct MockRunner {
    /// Programs reported as unavailable.
    unavailable: Arc<RwLock<HashSet<String>>>,
    /// Responses keyed by program and subcommand.
    rules: Arc<RwLock<Vec<ResponseRule>>>,
    /// Fallback responses, consumed in order.
    responses: Arc<RwLock<Vec<MockResponse>>>,
    /// Index of next fallback response to return.
    response_index: Arc<AtomicUsize>,
    /// Captured calls for verification.
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Simulated failure to return (as a string message for ExecutionFailed).
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a program as not installed.
    pub fn set_unavailable(self, program: impl Into<String>) -> Self {
        self.unavailable.write().insert(program.into());
        self
    }

    /// Respond to `program subcommand ...` with a fixed response.
    pub fn respond_to(
        self,
        program: impl Into<String>,
        subcommand: impl Into<String>,
        response: MockResponse,
    ) -> Self {
        self.rules.write().push(ResponseRule {
            program: program.into(),
            subcommand: subcommand.into(),
            response,
        });
        self
    }

    /// Add a fallback response for the next unmatched call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Set a failure to simulate.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Get calls to a specific program.
    pub fn calls_to(&self, program: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.program == program)
            .cloned()
            .collect()
    }

    /// Subcommands invoked on a program, in call order.
    pub fn subcommands(&self, program: &str) -> Vec<String> {
        self.calls_to(program)
            .iter()
            .filter_map(|c| c.subcommand().map(str::to_string))
            .collect()
    }

    /// Check if `program subcommand` was invoked.
    pub fn was_called(&self, program: &str, subcommand: &str) -> bool {
        self.captured_calls
            .read()
            .iter()
            .any(|c| c.program == program && c.subcommand() == Some(subcommand))
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn next_response(&self, spec: &CommandSpec) -> MockResponse {
        if let Some(rule) = self.rules.read().iter().find(|r| {
            r.program == spec.program && spec.subcommand() == Some(r.subcommand.as_str())
        }) {
            return rule.response.clone();
        }

        let responses = self.responses.read();
        if responses.is_empty() {
            return MockResponse::success("");
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index % responses.len())
            .cloned()
            .unwrap_or_else(|| MockResponse::success(""))
    }

    fn check_failure(&self) -> RunnerResult<()> {
        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(RunnerError::ExecutionFailed(msg));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn is_available(&self, program: &str) -> bool {
        !self.unavailable.read().contains(program)
    }

    async fn run(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult> {
        self.record_call(CapturedCall {
            program: spec.program.clone(),
            args: spec.args.clone(),
            env: spec.env.clone(),
            workdir: spec.workdir.clone(),
        });

        if self.unavailable.read().contains(&spec.program) {
            return Err(RunnerError::ProgramNotAvailable(spec.program.clone()));
        }
        self.check_failure()?;

        let response = self.next_response(spec);
        let started_at = Utc::now();
        let finished_at = started_at + chrono::Duration::milliseconds(response.duration_ms as i64);

        Ok(ExecutionResult {
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at,
            duration_ms: response.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rule_takes_precedence_over_queue() {
        let runner = MockRunner::new()
            .respond_to("terraform", "output", MockResponse::success("{}"))
            .add_response(MockResponse::failure(1, "queued"));

        let output = runner
            .run(&CommandSpec::new("terraform").arg("output"))
            .await
            .unwrap();
        assert_eq!(output.stdout, "{}");

        let other = runner
            .run(&CommandSpec::new("terraform").arg("init"))
            .await
            .unwrap();
        assert_eq!(other.exit_code, 1);
        assert_eq!(runner.subcommands("terraform"), vec!["output", "init"]);
    }

    #[tokio::test]
    async fn test_unavailable_program() {
        let runner = MockRunner::new().set_unavailable("git");
        assert!(!runner.is_available("git").await);
        assert!(runner.is_available("terraform").await);

        let err = runner.run(&CommandSpec::new("git").arg("status")).await;
        assert!(matches!(err, Err(RunnerError::ProgramNotAvailable(_))));
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let runner = MockRunner::new().simulate_failure("boom");
        let err = runner.run(&CommandSpec::new("git")).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
