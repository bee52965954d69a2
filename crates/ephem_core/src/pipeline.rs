//! The environment pipeline: load → configure → sync → write → dispatch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use ephem_cloud::{s3_uri, CloudError, CloudProvisioner, StateStorage};
use ephem_iac::{TerraformRunner, VarFileWriter};
use ephem_runner::CommandRunner;
use ephem_vars::{EnvOverrides, SchemaValidator, VarRenderer};

use crate::artifacts;
use crate::context::{LifecycleCommand, RunContext, RunOptions, StateLocation};
use crate::error::{CoreError, CoreResult};
use crate::git::GitOps;

/// Optional schema an infrastructure repository ships for its `variables`.
pub const REPO_SCHEMA_FILE: &str = "ephem.schema.json";

/// What `query` found out about an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentStatus {
    pub environment: String,
    pub project: String,
    pub state_bucket: String,
    pub state_key: String,
    /// Whether a state object exists for the environment
    pub exists: bool,
    /// Resource addresses recorded in state
    pub resources: Vec<String>,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Created { outputs: Value },
    Planned { changes: bool },
    Destroyed { artifacts_removed: usize },
    Outputs(Value),
    Queried(EnvironmentStatus),
}

/// Drives one environment through its lifecycle.
pub struct Pipeline {
    runner: Arc<dyn CommandRunner>,
    cloud: Arc<dyn CloudProvisioner>,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn CommandRunner>, cloud: Arc<dyn CloudProvisioner>) -> Self {
        Self { runner, cloud }
    }

    /// Load and validate the variables file into a fresh context.
    pub fn load(
        path: impl AsRef<Path>,
        command: LifecycleCommand,
        options: RunOptions,
        overrides: &EnvOverrides,
    ) -> CoreResult<RunContext> {
        let path = path.as_ref();
        let loaded = ephem_vars::load(path, overrides)?;
        for warning in &loaded.warnings {
            warn!("{}", warning);
        }

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let ctx = RunContext::new(command, options, base_dir, loaded.vars, loaded.warnings);
        info!(
            "Run {}: {} {} in {}",
            ctx.run_id,
            command,
            ctx.vars.qualified_name(),
            ctx.region()
        );
        Ok(ctx)
    }

    /// Resolve the account, state location and tags, make sure state
    /// storage exists, and stage artifacts.
    pub async fn configure(&self, ctx: &mut RunContext) -> CoreResult<()> {
        let identity = self.cloud.caller_identity().await?;
        if let Some(expected) = &ctx.vars.aws.account_id {
            if expected != &identity.account_id {
                return Err(CloudError::AccountMismatch {
                    expected: expected.clone(),
                    actual: identity.account_id,
                }
                .into());
            }
        }
        info!("Using account {} ({})", identity.account_id, identity.arn);

        let bucket = ctx
            .vars
            .state
            .bucket
            .clone()
            .unwrap_or_else(|| StateStorage::default_bucket_name(&identity.account_id, ctx.region()));
        ctx.account_id = Some(identity.account_id);
        ctx.state = Some(StateLocation {
            bucket,
            key: ctx.state_key(),
            lock_table: ctx.vars.state.lock_table.clone(),
        });

        let renderer = VarRenderer::new(ctx.template_context());
        ctx.tags = renderer.render_map(&ctx.tags, "tags")?;

        let storage = ctx.state_storage().ok_or(CoreError::StepOrder("configure"))?;
        let status = self
            .cloud
            .ensure_state_storage(&storage, ctx.options.bootstrap)
            .await?;
        if status.bucket_created {
            println!("Created state bucket {}", storage.bucket);
        }
        if status.lock_table_created {
            println!("Created lock table {}", storage.lock_table);
        }

        self.stage_artifacts(ctx, &storage.bucket).await
    }

    async fn stage_artifacts(&self, ctx: &mut RunContext, bucket: &str) -> CoreResult<()> {
        if ctx.vars.artifacts.is_empty() {
            return Ok(());
        }

        let upload = ctx.command.stages_artifacts() && !ctx.options.skip_download;
        let files = match artifacts::resolve(&ctx.vars.artifacts, &ctx.base_dir, &ctx.artifact_prefix()) {
            Ok(files) => files,
            Err(e) if !upload => {
                // Artifacts are only referenced here, not uploaded
                warn!("Skipping artifact resolution: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for file in files {
            let uri = if upload {
                info!("Uploading {:?}", file.path);
                self.cloud.stage_artifact(bucket, &file.key, &file.path).await?
            } else {
                s3_uri(bucket, &file.key)
            };
            ctx.artifact_uris.insert(file.name, uri);
        }

        if upload {
            println!("Staged {} artifact(s)", ctx.artifact_uris.len());
        }
        Ok(())
    }

    /// Bring the checkout to the configured ref.
    pub async fn sync(&self, ctx: &mut RunContext) -> CoreResult<()> {
        if ctx.options.skip_download {
            if !ctx.workdir.is_dir() {
                return Err(CoreError::WorkdirMissing(ctx.workdir.clone()));
            }
            info!("Skipping repository sync; using {:?}", ctx.workdir);
        } else {
            let git = GitOps::new(self.runner.clone(), &ctx.workdir);
            let synced = git
                .sync(&ctx.vars.repository.url, &ctx.vars.repository.git_ref)
                .await?;
            println!(
                "Repository {} at {} ({})",
                ctx.vars.repository.url,
                ctx.vars.repository.git_ref,
                short_commit(&synced.commit)
            );
            ctx.commit = Some(synced.commit);
        }

        let module_dir = ctx.module_dir();
        if !module_dir.is_dir() {
            return Err(CoreError::ModuleMissing(module_dir));
        }
        Ok(())
    }

    /// Render variables and write the var file and backend configuration.
    pub fn write(&self, ctx: &mut RunContext) -> CoreResult<()> {
        let renderer = VarRenderer::new(ctx.template_context());
        let rendered = match renderer.render_value(&Value::Object(ctx.vars.variables.clone()), "variables")? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let module_dir = ctx.module_dir();
        let repo_schema = module_dir.join(REPO_SCHEMA_FILE);
        if repo_schema.is_file() {
            debug!("Validating variables against {:?}", repo_schema);
            SchemaValidator::from_file(&repo_schema)?.validate(&Value::Object(rendered.clone()))?;
        }

        let (variables, collisions) = inject(ctx, rendered);
        for key in collisions {
            let message = format!("variables.{} is reserved and was replaced by the generated value", key);
            warn!("{}", message);
            ctx.warnings.push(message);
        }

        let path = absolute(&ctx.var_file_path())?;
        VarFileWriter::write_var_file(&path, &variables)?;
        let backend = ctx.backend_config().ok_or(CoreError::StepOrder("configure"))?;
        VarFileWriter::write_backend(&module_dir, &backend)?;

        ctx.var_file = Some(path);
        Ok(())
    }

    /// Hand over to Terraform for the requested command.
    pub async fn dispatch(&self, ctx: &RunContext) -> CoreResult<Outcome> {
        let var_file = ctx.var_file.as_deref().ok_or(CoreError::StepOrder("write"))?;
        let state = ctx.state.as_ref().ok_or(CoreError::StepOrder("configure"))?;
        let module_dir = ctx.module_dir();

        let terraform = TerraformRunner::new(self.runner.clone())
            .with_binary(ctx.terraform_binary())
            .with_debug(ctx.options.debug);
        terraform.ensure_available().await?;

        let outcome = match ctx.command {
            LifecycleCommand::Create => {
                terraform.init(&module_dir).await?;
                terraform.apply(&module_dir, var_file).await?;
                Outcome::Created {
                    outputs: terraform.output(&module_dir, None).await?,
                }
            }
            LifecycleCommand::Plan => {
                terraform.init(&module_dir).await?;
                let summary = terraform.plan(&module_dir, var_file).await?;
                Outcome::Planned {
                    changes: summary.changes,
                }
            }
            LifecycleCommand::Destroy => {
                terraform.init(&module_dir).await?;
                terraform.destroy(&module_dir, var_file).await?;
                let removed = self
                    .cloud
                    .remove_artifacts(&state.bucket, &ctx.artifact_prefix())
                    .await?;
                Outcome::Destroyed {
                    artifacts_removed: removed,
                }
            }
            LifecycleCommand::Output => {
                terraform.init(&module_dir).await?;
                let name = ctx.options.output_name.as_deref();
                Outcome::Outputs(terraform.output(&module_dir, name).await?)
            }
            LifecycleCommand::Query => {
                let exists = self.cloud.state_exists(&state.bucket, &state.key).await?;
                let resources = if exists {
                    terraform.init(&module_dir).await?;
                    terraform.state_list(&module_dir).await?
                } else {
                    Vec::new()
                };
                Outcome::Queried(EnvironmentStatus {
                    environment: ctx.vars.environment.clone(),
                    project: ctx.vars.project.clone(),
                    state_bucket: state.bucket.clone(),
                    state_key: state.key.clone(),
                    exists,
                    resources,
                })
            }
        };

        Ok(outcome)
    }

    /// Run every step in order.
    pub async fn run(&self, ctx: &mut RunContext) -> CoreResult<Outcome> {
        self.configure(ctx).await?;
        self.sync(ctx).await?;
        self.write(ctx)?;
        let outcome = self.dispatch(ctx).await?;

        if ctx.options.remove_workdir && ctx.workdir.exists() {
            std::fs::remove_dir_all(&ctx.workdir)?;
            info!("Removed working directory {:?}", ctx.workdir);
        }

        Ok(outcome)
    }
}

/// Merge generated keys over the rendered user variables, returning the
/// user keys that were replaced.
fn inject(ctx: &RunContext, mut variables: Map<String, Value>) -> (Map<String, Value>, Vec<String>) {
    let artifact_uris: Map<String, Value> = ctx
        .artifact_uris
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let tags: Map<String, Value> = ctx
        .tags
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    let injected = [
        ("environment", Value::String(ctx.vars.environment.clone())),
        ("project", Value::String(ctx.vars.project.clone())),
        ("region", Value::String(ctx.region().to_string())),
        (
            "account_id",
            Value::String(ctx.account_id.clone().unwrap_or_default()),
        ),
        ("tags", Value::Object(tags)),
        ("artifact_uris", Value::Object(artifact_uris)),
    ];

    let mut collisions = Vec::new();
    for (key, value) in injected {
        if variables.insert(key.to_string(), value).is_some() {
            collisions.push(key.to_string());
        }
    }
    (variables, collisions)
}

fn absolute(path: &Path) -> CoreResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn short_commit(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}
