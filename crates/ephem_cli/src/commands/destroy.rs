//! Destroy command - Tear an environment down.

use anyhow::{bail, Result};

use ephem_core::{LifecycleCommand, Outcome};

use super::EnvArgs;

pub async fn execute(args: EnvArgs) -> Result<()> {
    let (ctx, outcome) = super::run(LifecycleCommand::Destroy, args.options(), &args.vars_file).await?;

    let artifacts_removed = match outcome {
        Outcome::Destroyed { artifacts_removed } => artifacts_removed,
        other => bail!("Unexpected result for destroy: {:?}", other),
    };

    println!("🗑️  Environment {} destroyed", ctx.vars.qualified_name());
    if artifacts_removed > 0 {
        println!("   Removed {} staged artifact(s)", artifacts_removed);
    }
    Ok(())
}
