//! Plan command - Show pending changes for an environment.

use anyhow::{bail, Result};

use ephem_core::{LifecycleCommand, Outcome};

use super::EnvArgs;

pub async fn execute(args: EnvArgs) -> Result<()> {
    let (ctx, outcome) = super::run(LifecycleCommand::Plan, args.options(), &args.vars_file).await?;

    match outcome {
        Outcome::Planned { changes: true } => {
            println!("📝 Changes pending for {}", ctx.vars.qualified_name())
        }
        Outcome::Planned { changes: false } => {
            println!("✅ {} is up to date", ctx.vars.qualified_name())
        }
        other => bail!("Unexpected result for plan: {:?}", other),
    }

    if let Some(var_file) = &ctx.var_file {
        println!("   Variables: {}", var_file.display());
    }
    Ok(())
}
