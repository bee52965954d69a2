//! Error types for the core module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while running the environment pipeline.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Git error: {0}")]
    GitError(String),

    #[error("Working directory {0} does not exist; run without --skip-download first")]
    WorkdirMissing(PathBuf),

    #[error("Terraform module directory {0} does not exist in the repository")]
    ModuleMissing(PathBuf),

    #[error("Artifact pattern '{pattern}' is invalid: {message}")]
    InvalidArtifactPattern { pattern: String, message: String },

    #[error("Artifact pattern '{0}' matched no files")]
    ArtifactNotFound(String),

    #[error("Artifact '{name}' is matched by both {first} and {second}")]
    ArtifactConflict {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Pipeline step '{0}' has not run yet")]
    StepOrder(&'static str),

    #[error("Variables error: {0}")]
    Vars(#[from] ephem_vars::VarsError),

    #[error("Cloud error: {0}")]
    Cloud(#[from] ephem_cloud::CloudError),

    #[error("IaC error: {0}")]
    Iac(#[from] ephem_iac::IacError),

    #[error("Runner error: {0}")]
    Runner(#[from] ephem_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
