//! Error types for IaC module.

use thiserror::Error;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur during IaC operations.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Terraform not available: {0}")]
    TerraformNotAvailable(String),

    #[error("Terraform init failed: {0}")]
    InitFailed(String),

    #[error("Terraform plan failed: {0}")]
    PlanFailed(String),

    #[error("Terraform apply failed: {0}")]
    ApplyFailed(String),

    #[error("Terraform destroy failed: {0}")]
    DestroyFailed(String),

    #[error("Terraform output failed: {0}")]
    OutputFailed(String),

    #[error("Terraform state query failed: {0}")]
    StateFailed(String),

    #[error("Failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },

    #[error("Runner error: {0}")]
    Runner(#[from] ephem_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
