//! Terraform runner.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use ephem_runner::{CommandRunner, CommandSpec};

use crate::error::{IacError, IacResult};

/// Result of a Terraform operation.
#[derive(Debug)]
pub struct TerraformResult {
    pub success: bool,
    pub output: String,
    pub stdout: String,
    pub exit_code: i64,
}

/// Outcome of `terraform plan -detailed-exitcode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    /// Whether the plan contains changes
    pub changes: bool,
}

/// Terraform runner that executes commands through a [`CommandRunner`].
pub struct TerraformRunner {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    env: BTreeMap<String, String>,
}

impl TerraformRunner {
    /// Create a new Terraform runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let mut env = BTreeMap::new();
        env.insert("TF_IN_AUTOMATION".to_string(), "1".to_string());
        Self {
            runner,
            binary: "terraform".to_string(),
            env,
        }
    }

    /// Set a custom Terraform executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Enable Terraform's own debug log.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        if enabled {
            self.env.insert("TF_LOG".to_string(), "DEBUG".to_string());
        } else {
            self.env.remove("TF_LOG");
        }
        self
    }

    /// Add an environment variable for every Terraform invocation.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Fail early when the binary cannot be launched.
    pub async fn ensure_available(&self) -> IacResult<()> {
        if self.runner.is_available(&self.binary).await {
            Ok(())
        } else {
            Err(IacError::TerraformNotAvailable(format!(
                "'{}' could not be executed; install Terraform or set terraform.binary",
                self.binary
            )))
        }
    }

    /// Report the Terraform version (first line of `terraform version`).
    pub async fn version(&self, working_dir: &Path) -> IacResult<String> {
        let result = self.run_command(working_dir, &["version"], false).await?;
        if !result.success {
            return Err(IacError::TerraformNotAvailable(result.output));
        }
        Ok(result.stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Run terraform init.
    pub async fn init(&self, working_dir: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform init in {:?}", working_dir);
        let result = self
            .run_command(working_dir, &["init", "-input=false", "-reconfigure"], true)
            .await?;
        if !result.success {
            return Err(IacError::InitFailed(result.output));
        }
        Ok(result)
    }

    /// Run terraform plan; exit code 2 means changes are pending.
    pub async fn plan(&self, working_dir: &Path, var_file: &Path) -> IacResult<PlanSummary> {
        info!("Running terraform plan in {:?}", working_dir);
        let var_arg = var_file_arg(var_file);
        let result = self
            .run_command(
                working_dir,
                &["plan", "-input=false", "-detailed-exitcode", &var_arg],
                true,
            )
            .await?;

        match result.exit_code {
            0 => Ok(PlanSummary { changes: false }),
            2 => Ok(PlanSummary { changes: true }),
            _ => Err(IacError::PlanFailed(result.output)),
        }
    }

    /// Run terraform apply.
    pub async fn apply(&self, working_dir: &Path, var_file: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform apply in {:?}", working_dir);
        let var_arg = var_file_arg(var_file);
        let result = self
            .run_command(
                working_dir,
                &["apply", "-input=false", "-auto-approve", &var_arg],
                true,
            )
            .await?;
        if !result.success {
            return Err(IacError::ApplyFailed(result.output));
        }
        Ok(result)
    }

    /// Run terraform destroy.
    pub async fn destroy(&self, working_dir: &Path, var_file: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform destroy in {:?}", working_dir);
        let var_arg = var_file_arg(var_file);
        let result = self
            .run_command(
                working_dir,
                &["destroy", "-input=false", "-auto-approve", &var_arg],
                true,
            )
            .await?;
        if !result.success {
            return Err(IacError::DestroyFailed(result.output));
        }
        Ok(result)
    }

    /// Read outputs as JSON, optionally a single named output.
    pub async fn output(&self, working_dir: &Path, name: Option<&str>) -> IacResult<Value> {
        let mut args = vec!["output", "-json"];
        if let Some(name) = name {
            args.push(name);
        }
        let result = self.run_command(working_dir, &args, false).await?;
        if !result.success {
            return Err(IacError::OutputFailed(result.output));
        }

        let stdout = result.stdout.trim();
        if stdout.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(stdout)?)
    }

    /// List resource addresses recorded in state.
    pub async fn state_list(&self, working_dir: &Path) -> IacResult<Vec<String>> {
        let result = self.run_command(working_dir, &["state", "list"], false).await?;
        if !result.success {
            return Err(IacError::StateFailed(result.output));
        }
        Ok(result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Run arbitrary terraform command.
    async fn run_command(
        &self,
        working_dir: &Path,
        args: &[&str],
        stream: bool,
    ) -> IacResult<TerraformResult> {
        let mut spec = CommandSpec::new(&self.binary)
            .args(args.iter().copied())
            .workdir(working_dir)
            .envs(&self.env);
        if stream {
            spec = spec.stream();
        }

        debug!("Executing terraform {:?}", args);

        let result = self.runner.run(&spec).await?;

        Ok(TerraformResult {
            success: result.success(),
            output: result.combined_output(),
            stdout: result.stdout,
            exit_code: result.exit_code,
        })
    }
}

fn var_file_arg(var_file: &Path) -> String {
    format!("-var-file={}", var_file.display())
}
