//! CLI command definitions.
//!
//! Every subcommand takes the variables file and the same set of run
//! flags, then drives the pipeline for one lifecycle command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use ephem_cloud::AwsCloud;
use ephem_core::{LifecycleCommand, Outcome, Pipeline, RunContext, RunOptions};
use ephem_runner::ProcessRunner;
use ephem_vars::{EnvOverrides, EnvStash};

pub mod create;
pub mod destroy;
pub mod output;
pub mod plan;
pub mod query;

/// ephem - disposable cloud environments on top of Terraform
#[derive(Parser)]
#[command(name = "ephem")]
#[command(version, about = "ephem - disposable cloud environments on top of Terraform")]
#[command(long_about = r#"
ephem drives the lifecycle of disposable cloud environments. Each run loads
a variables file, validates it, prepares remote state storage, syncs the
infrastructure repository and hands over to Terraform.

COMMANDS:
  create   → Stage artifacts and apply the environment
  plan     → Show pending changes
  destroy  → Destroy the environment and its staged artifacts
  output   → Print Terraform outputs as JSON
  query    → Report whether the environment exists and what it holds

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
  5 - Terraform error
  6 - Cloud error
  7 - Git error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update an environment
    Create(EnvArgs),

    /// Destroy an environment
    Destroy(EnvArgs),

    /// Print the outputs of an environment
    Output(output::OutputArgs),

    /// Plan changes to an environment
    Plan(EnvArgs),

    /// Report the state of an environment
    Query(EnvArgs),
}

impl Commands {
    pub fn env_args(&self) -> &EnvArgs {
        match self {
            Commands::Create(args)
            | Commands::Destroy(args)
            | Commands::Plan(args)
            | Commands::Query(args) => args,
            Commands::Output(args) => &args.env,
        }
    }
}

/// Arguments shared by every command.
#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    /// Variables file (.json, .yaml, .yml or .toml)
    #[arg(value_name = "VARS_FILE")]
    pub vars_file: PathBuf,

    /// Create the state bucket and lock table when missing
    #[arg(long, env = "EPHEM_BOOTSTRAP", value_parser = FalseyValueParser::new())]
    pub bootstrap: bool,

    /// Debug logging, also sets TF_LOG=DEBUG for Terraform
    #[arg(long, env = "EPHEM_DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Delete the working directory after a successful run
    #[arg(long)]
    pub remove_workdir: bool,

    /// Reuse the existing checkout; no git sync and no artifact upload
    #[arg(long)]
    pub skip_download: bool,

    /// Write the generated variable file to this path
    #[arg(long, value_name = "PATH")]
    pub vars_out: Option<PathBuf>,

    /// Checkout directory [default: .ephem/<project>-<environment>]
    #[arg(long, env = "EPHEM_WORKDIR", value_name = "PATH")]
    pub workdir: Option<PathBuf>,

    /// Terraform executable
    #[arg(long, env = "EPHEM_TERRAFORM", value_name = "BIN")]
    pub terraform: Option<String>,
}

impl EnvArgs {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            bootstrap: self.bootstrap,
            debug: self.debug,
            remove_workdir: self.remove_workdir,
            skip_download: self.skip_download,
            vars_out: self.vars_out.clone(),
            workdir: self.workdir.clone(),
            terraform: self.terraform.clone(),
            output_name: None,
        }
    }
}

/// Load the variables file and run the full pipeline.
pub async fn run(
    command: LifecycleCommand,
    options: RunOptions,
    vars_file: &Path,
) -> Result<(RunContext, Outcome)> {
    let mut ctx = Pipeline::load(vars_file, command, options, &EnvOverrides::from_env())
        .with_context(|| format!("Failed to load {}", vars_file.display()))?;

    println!(
        "🌱 {} {} ({}, {})",
        command,
        ctx.vars.qualified_name(),
        ctx.region(),
        ctx.run_id
    );

    // Held for the whole run so Terraform inherits the same credentials
    let stash = EnvStash::for_profile(ctx.vars.aws.profile.as_deref());
    if !stash.keys().is_empty() {
        info!("Stashed environment: {}", stash.keys().join(", "));
    }

    let cloud = AwsCloud::connect(&ctx.vars.aws).await;
    let runner = ProcessRunner::new().ci_mode(std::env::var_os("CI").is_some());
    let pipeline = Pipeline::new(Arc::new(runner), Arc::new(cloud));

    let outcome = pipeline
        .run(&mut ctx)
        .await
        .with_context(|| format!("{} failed for {}", command, ctx.vars.qualified_name()))?;

    stash.restore();
    Ok((ctx, outcome))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
