//! Data models for the variables file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default git ref checked out when none is given.
pub const DEFAULT_REF: &str = "main";

/// Default DynamoDB lock table name.
pub const DEFAULT_LOCK_TABLE: &str = "ephem-locks";

/// Default prefix for remote state keys.
pub const DEFAULT_KEY_PREFIX: &str = "environments";

/// Default Terraform executable.
pub const DEFAULT_TERRAFORM: &str = "terraform";

/// A user-supplied variables file describing one disposable environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariablesFile {
    /// Environment name (e.g. `feature-123`)
    pub environment: String,
    /// Project the environment belongs to
    pub project: String,
    pub aws: AwsSettings,
    pub repository: RepositorySpec,
    #[serde(default)]
    pub state: StateSettings,
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Values forwarded to Terraform
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Checkout directory for the IaC repository
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub terraform: TerraformSettings,
}

impl VariablesFile {
    /// `<project>-<environment>`, used for default directory names.
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.project, self.environment)
    }
}

/// AWS account settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
    /// Expected account; the run aborts if the credentials resolve elsewhere
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Location of the infrastructure-as-code repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositorySpec {
    pub url: String,
    #[serde(default = "default_ref", rename = "ref")]
    pub git_ref: String,
    /// Terraform module directory relative to the repository root
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_ref() -> String {
    DEFAULT_REF.to_string()
}

fn default_path() -> PathBuf {
    PathBuf::from(".")
}

/// Remote state settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateSettings {
    /// Override for the computed state bucket name
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_lock_table")]
    pub lock_table: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            lock_table: default_lock_table(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_lock_table() -> String {
    DEFAULT_LOCK_TABLE.to_string()
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

/// Local files to upload before Terraform runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Glob pattern or directory, relative to the variables file
    pub source: String,
    /// Extra key prefix under the environment's artifact prefix
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Terraform invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerraformSettings {
    #[serde(default = "default_terraform")]
    pub binary: String,
}

impl Default for TerraformSettings {
    fn default() -> Self {
        Self {
            binary: default_terraform(),
        }
    }
}

fn default_terraform() -> String {
    DEFAULT_TERRAFORM.to_string()
}
