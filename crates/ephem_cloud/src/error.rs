//! Error types for cloud operations.

use thiserror::Error;

/// Result type alias for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur while talking to the cloud provider.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Cloud credentials could not be resolved: {0}")]
    Credentials(String),

    #[error("Credentials belong to account {actual}, but the variables file expects {expected}")]
    AccountMismatch { expected: String, actual: String },

    #[error("State bucket '{0}' does not exist; rerun with --bootstrap to create it")]
    StorageMissing(String),

    #[error("Lock table '{0}' does not exist; rerun with --bootstrap to create it")]
    LockTableMissing(String),

    #[error("State storage error: {0}")]
    Storage(String),

    #[error("Artifact staging failed for {path}: {message}")]
    Artifact { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
