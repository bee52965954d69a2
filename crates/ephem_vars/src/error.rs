//! Error types for the variables module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for variables operations.
pub type VarsResult<T> = Result<T, VarsError>;

/// Errors that can occur while loading and validating a variables file.
#[derive(Error, Debug)]
pub enum VarsError {
    #[error("Variables file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported variables file format: {0} (expected .json, .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid variables file {path}: {message}")]
    InvalidFormat { path: PathBuf, message: String },

    #[error("Invalid schema {name}: {message}")]
    InvalidSchema { name: String, message: String },

    #[error("Schema validation failed against {schema}:\n  - {}", .violations.join("\n  - "))]
    SchemaViolation {
        schema: String,
        violations: Vec<String>,
    },

    #[error("Validation failed:\n  - {}", .0.join("\n  - "))]
    ValidationFailed(Vec<String>),

    #[error("Template error: unknown placeholder '{{{{ {placeholder} }}}}' in {location}")]
    UnknownPlaceholder {
        placeholder: String,
        location: String,
    },

    #[error("Invalid override {key}: {message}")]
    InvalidOverride { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
