//! Run context: the configuration record carried through the pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ephem_cloud::StateStorage;
use ephem_iac::{BackendConfig, VAR_FILE_NAME};
use ephem_vars::VariablesFile;

/// Directory holding default checkouts, relative to the current directory.
pub const DEFAULT_WORK_ROOT: &str = ".ephem";

/// Value of the `ManagedBy` tag.
pub const MANAGED_BY: &str = "ephem";

/// Lifecycle command being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleCommand {
    Create,
    Destroy,
    Output,
    Plan,
    Query,
}

impl LifecycleCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Destroy => "destroy",
            Self::Output => "output",
            Self::Plan => "plan",
            Self::Query => "query",
        }
    }

    /// Commands that upload artifacts before running Terraform.
    pub fn stages_artifacts(&self) -> bool {
        matches!(self, Self::Create | Self::Plan)
    }
}

impl std::fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Flags shared by every command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Create missing state storage
    pub bootstrap: bool,
    /// Verbose logging and `TF_LOG=DEBUG`
    pub debug: bool,
    /// Delete the working directory after a successful run
    pub remove_workdir: bool,
    /// Reuse the existing checkout without syncing or uploading
    pub skip_download: bool,
    /// Where to write the generated variable file
    pub vars_out: Option<PathBuf>,
    /// Checkout directory override
    pub workdir: Option<PathBuf>,
    /// Terraform executable override
    pub terraform: Option<String>,
    /// Single output name (output command only)
    pub output_name: Option<String>,
}

/// Resolved location of the environment's remote state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLocation {
    pub bucket: String,
    pub key: String,
    pub lock_table: String,
}

/// Everything known about one run.
///
/// Created by `Pipeline::load`, then filled in by each later step.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub command: LifecycleCommand,
    pub options: RunOptions,
    /// Directory of the variables file; artifact patterns resolve against it
    pub base_dir: PathBuf,
    pub vars: VariablesFile,
    pub warnings: Vec<String>,
    pub account_id: Option<String>,
    pub state: Option<StateLocation>,
    pub tags: BTreeMap<String, String>,
    /// Staged artifact file name → `s3://` URI
    pub artifact_uris: BTreeMap<String, String>,
    pub workdir: PathBuf,
    pub commit: Option<String>,
    pub var_file: Option<PathBuf>,
}

impl RunContext {
    pub fn new(
        command: LifecycleCommand,
        options: RunOptions,
        base_dir: PathBuf,
        vars: VariablesFile,
        warnings: Vec<String>,
    ) -> Self {
        let workdir = options
            .workdir
            .clone()
            .or_else(|| vars.workdir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_ROOT).join(vars.qualified_name()));
        let tags = Self::standard_tags(&vars);

        Self {
            run_id: Uuid::new_v4(),
            command,
            options,
            base_dir,
            vars,
            warnings,
            account_id: None,
            state: None,
            tags,
            artifact_uris: BTreeMap::new(),
            workdir,
            commit: None,
            var_file: None,
        }
    }

    /// User tags overlaid with the standard ephem tags.
    pub fn standard_tags(vars: &VariablesFile) -> BTreeMap<String, String> {
        let mut tags = vars.tags.clone();
        tags.insert("Environment".to_string(), vars.environment.clone());
        tags.insert("Project".to_string(), vars.project.clone());
        tags.insert("ManagedBy".to_string(), MANAGED_BY.to_string());
        tags
    }

    pub fn region(&self) -> &str {
        &self.vars.aws.region
    }

    /// `<key_prefix>/<project>/<environment>.tfstate`
    pub fn state_key(&self) -> String {
        format!(
            "{}/{}/{}.tfstate",
            self.vars.state.key_prefix.trim_end_matches('/'),
            self.vars.project,
            self.vars.environment
        )
    }

    /// Key prefix for this environment's staged artifacts.
    pub fn artifact_prefix(&self) -> String {
        format!("artifacts/{}/{}/", self.vars.project, self.vars.environment)
    }

    /// Terraform module directory inside the checkout.
    pub fn module_dir(&self) -> PathBuf {
        let path = &self.vars.repository.path;
        if path == Path::new(".") {
            self.workdir.clone()
        } else {
            self.workdir.join(path)
        }
    }

    /// Where the generated variable file goes.
    pub fn var_file_path(&self) -> PathBuf {
        self.options
            .vars_out
            .clone()
            .unwrap_or_else(|| self.module_dir().join(VAR_FILE_NAME))
    }

    pub fn terraform_binary(&self) -> &str {
        self.options
            .terraform
            .as_deref()
            .unwrap_or(&self.vars.terraform.binary)
    }

    /// Storage description for bootstrap, once the state location is known.
    pub fn state_storage(&self) -> Option<StateStorage> {
        self.state.as_ref().map(|state| StateStorage {
            bucket: state.bucket.clone(),
            lock_table: state.lock_table.clone(),
            region: self.region().to_string(),
            tags: self.tags.clone(),
        })
    }

    pub fn backend_config(&self) -> Option<BackendConfig> {
        self.state.as_ref().map(|state| BackendConfig {
            bucket: state.bucket.clone(),
            key: state.key.clone(),
            region: self.region().to_string(),
            dynamodb_table: state.lock_table.clone(),
            profile: self.vars.aws.profile.clone(),
        })
    }

    /// Values available to `{{ name }}` placeholders.
    pub fn template_context(&self) -> BTreeMap<String, String> {
        let mut ctx = BTreeMap::new();
        ctx.insert("environment".to_string(), self.vars.environment.clone());
        ctx.insert("project".to_string(), self.vars.project.clone());
        ctx.insert("region".to_string(), self.region().to_string());
        ctx.insert("run_id".to_string(), self.run_id.to_string());
        if let Some(account_id) = &self.account_id {
            ctx.insert("account_id".to_string(), account_id.clone());
        }
        if let Some(state) = &self.state {
            ctx.insert("state_bucket".to_string(), state.bucket.clone());
            ctx.insert("state_key".to_string(), state.key.clone());
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> VariablesFile {
        serde_json::from_value(json!({
            "environment": "dev",
            "project": "shop",
            "aws": { "region": "eu-west-1", "profile": "sandbox" },
            "repository": { "url": "https://example.com/infra.git", "path": "envs/disposable" },
            "state": { "key_prefix": "envs/" },
            "tags": { "team": "payments", "Project": "spoofed" }
        }))
        .unwrap()
    }

    fn context(options: RunOptions) -> RunContext {
        RunContext::new(
            LifecycleCommand::Plan,
            options,
            PathBuf::from("."),
            vars(),
            Vec::new(),
        )
    }

    #[test]
    fn test_computed_paths() {
        let ctx = context(RunOptions::default());
        assert_eq!(ctx.workdir, PathBuf::from(".ephem/shop-dev"));
        assert_eq!(ctx.module_dir(), PathBuf::from(".ephem/shop-dev/envs/disposable"));
        assert_eq!(
            ctx.var_file_path(),
            PathBuf::from(".ephem/shop-dev/envs/disposable/ephem.tfvars.json")
        );
        assert_eq!(ctx.state_key(), "envs/shop/dev.tfstate");
        assert_eq!(ctx.artifact_prefix(), "artifacts/shop/dev/");
        assert_eq!(ctx.terraform_binary(), "terraform");
    }

    #[test]
    fn test_option_overrides() {
        let ctx = context(RunOptions {
            workdir: Some(PathBuf::from("/tmp/w")),
            vars_out: Some(PathBuf::from("/tmp/out.tfvars.json")),
            terraform: Some("tofu".to_string()),
            ..Default::default()
        });
        assert_eq!(ctx.module_dir(), PathBuf::from("/tmp/w/envs/disposable"));
        assert_eq!(ctx.var_file_path(), PathBuf::from("/tmp/out.tfvars.json"));
        assert_eq!(ctx.terraform_binary(), "tofu");
    }

    #[test]
    fn test_standard_tags_win() {
        let ctx = context(RunOptions::default());
        assert_eq!(ctx.tags.get("Project").map(String::as_str), Some("shop"));
        assert_eq!(ctx.tags.get("Environment").map(String::as_str), Some("dev"));
        assert_eq!(ctx.tags.get("ManagedBy").map(String::as_str), Some("ephem"));
        assert_eq!(ctx.tags.get("team").map(String::as_str), Some("payments"));
    }

    #[test]
    fn test_template_context_grows_with_state() {
        let mut ctx = context(RunOptions::default());
        assert!(!ctx.template_context().contains_key("account_id"));

        ctx.account_id = Some("123456789012".to_string());
        ctx.state = Some(StateLocation {
            bucket: "b".to_string(),
            key: ctx.state_key(),
            lock_table: "t".to_string(),
        });
        let tctx = ctx.template_context();
        assert_eq!(tctx.get("account_id").map(String::as_str), Some("123456789012"));
        assert_eq!(tctx.get("state_key").map(String::as_str), Some("envs/shop/dev.tfstate"));

        let backend = ctx.backend_config().unwrap();
        assert_eq!(backend.profile.as_deref(), Some("sandbox"));
        assert_eq!(backend.dynamodb_table, "t");
    }
}
