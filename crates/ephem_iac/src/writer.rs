//! Generated Terraform input files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::{IacError, IacResult};

/// File name of the generated variable file inside the module directory.
pub const VAR_FILE_NAME: &str = "ephem.tfvars.json";

/// File name of the generated backend configuration.
pub const BACKEND_FILE_NAME: &str = "ephem_backend.tf.json";

/// S3 backend settings for remote state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub bucket: String,
    pub key: String,
    pub region: String,
    pub dynamodb_table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl BackendConfig {
    /// The `terraform { backend "s3" { ... } }` block in JSON syntax.
    pub fn to_terraform_json(&self) -> Value {
        let mut s3 = json!({
            "bucket": self.bucket,
            "key": self.key,
            "region": self.region,
            "dynamodb_table": self.dynamodb_table,
            "encrypt": true,
        });
        if let Some(profile) = &self.profile {
            s3["profile"] = Value::String(profile.clone());
        }
        json!({ "terraform": { "backend": { "s3": s3 } } })
    }
}

/// Writer for the files Terraform consumes.
pub struct VarFileWriter;

impl VarFileWriter {
    /// Write a `*.tfvars.json` file, creating parent directories.
    pub fn write_var_file(path: &Path, variables: &Map<String, Value>) -> IacResult<PathBuf> {
        let content = serde_json::to_string_pretty(&Value::Object(variables.clone()))?;
        write_file(path, &content)?;
        info!("Wrote {} variable(s) to {:?}", variables.len(), path);
        Ok(path.to_path_buf())
    }

    /// Write the backend configuration into the module directory.
    pub fn write_backend(module_dir: &Path, backend: &BackendConfig) -> IacResult<PathBuf> {
        let path = module_dir.join(BACKEND_FILE_NAME);
        let content = serde_json::to_string_pretty(&backend.to_terraform_json())?;
        write_file(&path, &content)?;
        info!("Wrote S3 backend configuration to {:?}", path);
        Ok(path)
    }
}

fn write_file(path: &Path, content: &str) -> IacResult<()> {
    let wrap = |e: std::io::Error| IacError::WriteFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    fs::write(path, format!("{}\n", content)).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_json_shape() {
        let backend = BackendConfig {
            bucket: "state".to_string(),
            key: "environments/shop/dev.tfstate".to_string(),
            region: "eu-west-1".to_string(),
            dynamodb_table: "ephem-locks".to_string(),
            profile: None,
        };

        let value = backend.to_terraform_json();
        let s3 = &value["terraform"]["backend"]["s3"];
        assert_eq!(s3["bucket"], "state");
        assert_eq!(s3["key"], "environments/shop/dev.tfstate");
        assert_eq!(s3["encrypt"], true);
        assert!(s3.get("profile").is_none());

        let with_profile = BackendConfig {
            profile: Some("sandbox".to_string()),
            ..backend
        };
        assert_eq!(with_profile.to_terraform_json()["terraform"]["backend"]["s3"]["profile"], "sandbox");
    }
}
