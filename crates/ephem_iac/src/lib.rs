//! # ephem_iac
//!
//! Terraform invocation for ephem environments.
//!
//! This crate runs Terraform through the [`ephem_runner::CommandRunner`]
//! seam and writes the two files every run generates: the JSON variable
//! file and the S3 backend configuration.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use ephem_iac::{BackendConfig, TerraformRunner, VarFileWriter};
//! use ephem_runner::ProcessRunner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let module = Path::new("./infra/envs/disposable");
//!     let backend = BackendConfig {
//!         bucket: "ephem-state-123456789012-eu-west-1".to_string(),
//!         key: "environments/shop/dev.tfstate".to_string(),
//!         region: "eu-west-1".to_string(),
//!         dynamodb_table: "ephem-locks".to_string(),
//!         profile: None,
//!     };
//!     VarFileWriter::write_backend(module, &backend)?;
//!     let var_file = VarFileWriter::write_var_file(&module.join("ephem.tfvars.json"), &Default::default())?;
//!
//!     let terraform = TerraformRunner::new(Arc::new(ProcessRunner::new()));
//!     terraform.init(module).await?;
//!     let plan = terraform.plan(module, &var_file).await?;
//!     println!("changes pending: {}", plan.changes);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod terraform;
pub mod writer;

pub use error::{IacError, IacResult};
pub use terraform::{PlanSummary, TerraformResult, TerraformRunner};
pub use writer::{BackendConfig, VarFileWriter, BACKEND_FILE_NAME, VAR_FILE_NAME};
