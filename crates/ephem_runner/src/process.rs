//! Process-based command runner.
//!
//! Launches external tools as child processes on the tokio runtime,
//! capturing stdout and stderr line by line and optionally echoing them as
//! they arrive.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Output stream of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Runner that executes commands as local child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// CI mode (prefix streamed lines with timestamp and stream)
    ci_mode: bool,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            ci_mode: std::env::var("CI").is_ok(),
        }
    }

    pub fn ci_mode(mut self, enabled: bool) -> Self {
        self.ci_mode = enabled;
        self
    }
}

/// Read lines until EOF, echoing them when requested.
async fn collect_lines<R>(reader: R, stream: LogStream, echo: bool, ci_mode: bool) -> String
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    let mut output = String::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if echo {
                    if ci_mode {
                        println!(
                            "[{}] [{}] {}",
                            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                            stream,
                            line
                        );
                    } else {
                        match stream {
                            LogStream::Stdout => println!("{}", line),
                            LogStream::Stderr => eprintln!("{}", line),
                        }
                    }
                }
                output.push_str(&line);
                output.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read {} of child process: {}", stream, e);
                break;
            }
        }
    }

    output
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn is_available(&self, program: &str) -> bool {
        Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn run(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.workdir {
            // spawn reports a missing cwd as NotFound, same as a missing program
            if !dir.is_dir() {
                return Err(RunnerError::WorkdirMissing(dir.clone()));
            }
            cmd.current_dir(dir);
        }

        debug!("Executing: {}", spec.display());

        let started_at = Utc::now();
        let start = Instant::now();

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::ProgramNotAvailable(spec.program.clone())
            } else {
                RunnerError::ExecutionFailed(format!("Failed to spawn {}: {}", spec.program, e))
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stderr was not captured".to_string()))?;

        let stdout_task = tokio::spawn(collect_lines(
            stdout,
            LogStream::Stdout,
            spec.stream_output,
            self.ci_mode,
        ));
        let stderr_task = tokio::spawn(collect_lines(
            stderr,
            LogStream::Stderr,
            spec.stream_output,
            self.ci_mode,
        ));

        let status = match spec.timeout_seconds {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!("{} timed out after {}s, killing", spec.program, secs);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {}: {}", spec.program, e);
                    }
                    return Err(RunnerError::Timeout(secs));
                }
            },
            None => child.wait().await?,
        };

        let stdout = stdout_task
            .await
            .map_err(|e| RunnerError::ExecutionFailed(format!("stdout reader failed: {}", e)))?;
        let stderr = stderr_task
            .await
            .map_err(|e| RunnerError::ExecutionFailed(format!("stderr reader failed: {}", e)))?;

        let exit_code = status.code().map(i64::from).unwrap_or(-1);
        debug!("{} exited with {}", spec.program, exit_code);

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
