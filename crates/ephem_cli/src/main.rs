//! ephem CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error
//! - 5: Terraform error
//! - 6: Cloud error
//! - 7: Git error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ephem_cloud::CloudError;
use ephem_core::CoreError;
use ephem_iac::IacError;
use ephem_vars::VarsError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const TERRAFORM_ERROR: u8 = 5;
    pub const CLOUD_ERROR: u8 = 6;
    pub const GIT_ERROR: u8 = 7;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.env_args().debug);

    let result = match cli.command {
        Commands::Create(args) => commands::create::execute(args).await,
        Commands::Destroy(args) => commands::destroy::execute(args).await,
        Commands::Output(args) => commands::output::execute(args).await,
        Commands::Plan(args) => commands::plan::execute(args).await,
        Commands::Query(args) => commands::query::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "ephem=debug" } else { "ephem=info" };
    let mut filter = EnvFilter::from_default_env();
    for directive in [level, "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logging may already be initialized
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(debug).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Map the first typed error in the chain to an exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(core) = cause.downcast_ref::<CoreError>() {
            return match core {
                CoreError::GitError(_) => ExitCodes::GIT_ERROR,
                CoreError::Vars(vars) => vars_exit_code(vars),
                CoreError::Cloud(_) => ExitCodes::CLOUD_ERROR,
                CoreError::Iac(_) => ExitCodes::TERRAFORM_ERROR,
                CoreError::InvalidArtifactPattern { .. }
                | CoreError::ArtifactNotFound(_)
                | CoreError::ArtifactConflict { .. } => ExitCodes::VALIDATION_FAILURE,
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(vars) = cause.downcast_ref::<VarsError>() {
            return vars_exit_code(vars);
        }
        if cause.downcast_ref::<CloudError>().is_some() {
            return ExitCodes::CLOUD_ERROR;
        }
        if cause.downcast_ref::<IacError>().is_some() {
            return ExitCodes::TERRAFORM_ERROR;
        }
    }
    ExitCodes::GENERAL_ERROR
}

fn vars_exit_code(e: &VarsError) -> u8 {
    match e {
        VarsError::UnknownPlaceholder { .. } => ExitCodes::TEMPLATE_ERROR,
        VarsError::Io(_) => ExitCodes::GENERAL_ERROR,
        _ => ExitCodes::VALIDATION_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_categorize_typed_errors() {
        let git = anyhow::Error::new(CoreError::GitError("fetch failed".to_string()));
        assert_eq!(categorize_error(&git), ExitCodes::GIT_ERROR);

        let template = anyhow::Error::new(CoreError::Vars(VarsError::UnknownPlaceholder {
            placeholder: "zone".to_string(),
            location: "variables.zone".to_string(),
        }));
        assert_eq!(categorize_error(&template), ExitCodes::TEMPLATE_ERROR);

        let cloud = anyhow::Error::new(CoreError::Cloud(CloudError::StorageMissing("b".to_string())));
        assert_eq!(categorize_error(&cloud), ExitCodes::CLOUD_ERROR);

        let terraform = anyhow::Error::new(CoreError::Iac(IacError::ApplyFailed("boom".to_string())));
        assert_eq!(categorize_error(&terraform), ExitCodes::TERRAFORM_ERROR);

        let conflict = anyhow::Error::new(CoreError::ArtifactConflict {
            name: "fn.zip".to_string(),
            first: "a/fn.zip".into(),
            second: "b/fn.zip".into(),
        });
        assert_eq!(categorize_error(&conflict), ExitCodes::VALIDATION_FAILURE);
    }

    #[test]
    fn test_categorize_through_context() {
        let result: Result<(), VarsError> = Err(VarsError::ValidationFailed(vec!["bad".to_string()]));
        let err = result.context("Failed to load env.yaml").unwrap_err();
        assert_eq!(categorize_error(&err), ExitCodes::VALIDATION_FAILURE);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&plain), ExitCodes::GENERAL_ERROR);
        assert_eq!(ExitCodes::INVALID_ARGS, 2);
    }
}
