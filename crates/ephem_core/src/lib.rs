//! # ephem_core
//!
//! Lifecycle pipeline for disposable environments.
//!
//! A run is a fixed sequence of steps over a [`RunContext`]:
//!
//! - **load**: read and validate the variables file
//! - **configure**: resolve the account, ensure state storage, stage artifacts
//! - **sync**: bring the infrastructure repository checkout to its ref
//! - **write**: generate the Terraform var file and backend configuration
//! - **dispatch**: run Terraform for the requested command
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ephem_core::{LifecycleCommand, Pipeline, RunOptions};
//! use ephem_runner::ProcessRunner;
//! use ephem_vars::EnvOverrides;
//!
//! let mut ctx = Pipeline::load(
//!     "envs/feature-42.yaml",
//!     LifecycleCommand::Plan,
//!     RunOptions::default(),
//!     &EnvOverrides::from_env(),
//! )?;
//! let cloud = Arc::new(ephem_cloud::AwsCloud::connect(&ctx.vars.aws).await);
//! let pipeline = Pipeline::new(Arc::new(ProcessRunner::new()), cloud);
//! let outcome = pipeline.run(&mut ctx).await?;
//! ```

pub mod artifacts;
pub mod context;
pub mod error;
pub mod git;
pub mod pipeline;

pub use artifacts::StagedFile;
pub use context::{LifecycleCommand, RunContext, RunOptions, StateLocation};
pub use error::{CoreError, CoreResult};
pub use git::{GitOps, GitSync};
pub use pipeline::{EnvironmentStatus, Outcome, Pipeline, REPO_SCHEMA_FILE};
