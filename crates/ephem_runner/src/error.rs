//! Error types for the runner module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur during runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Program not available: {0}")]
    ProgramNotAvailable(String),

    #[error("Working directory does not exist: {0}")]
    WorkdirMissing(PathBuf),

    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Command timeout after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
