//! Variables file reading.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{VarsError, VarsResult};

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarsFormat {
    Json,
    Yaml,
    Toml,
}

impl VarsFormat {
    /// Detect the format from the file extension.
    pub fn detect(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Some(Self::Json),
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Reader for variables files.
pub struct VarsReader;

impl VarsReader {
    /// Read a variables file into a generic JSON document.
    pub fn read_value(path: impl AsRef<Path>) -> VarsResult<Value> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VarsError::NotFound(path.to_path_buf()));
        }

        let format =
            VarsFormat::detect(path).ok_or_else(|| VarsError::UnsupportedFormat(path.to_path_buf()))?;
        debug!("Reading variables from {:?} as {:?}", path, format);

        let content = fs::read_to_string(path)?;
        Self::parse(&content, format).map_err(|message| VarsError::InvalidFormat {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse document text in the given format.
    pub fn parse(content: &str, format: VarsFormat) -> Result<Value, String> {
        let value: Value = match format {
            VarsFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string())?,
            VarsFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string())?,
            VarsFormat::Toml => toml::from_str(content).map_err(|e| e.to_string())?,
        };

        if !value.is_object() {
            return Err("top level must be a mapping".to_string());
        }
        Ok(value)
    }
}
