//! Create command - Stage artifacts and apply an environment.

use anyhow::{bail, Result};

use ephem_core::{LifecycleCommand, Outcome};

use super::{print_json, EnvArgs};

pub async fn execute(args: EnvArgs) -> Result<()> {
    let (ctx, outcome) = super::run(LifecycleCommand::Create, args.options(), &args.vars_file).await?;

    let outputs = match outcome {
        Outcome::Created { outputs } => outputs,
        other => bail!("Unexpected result for create: {:?}", other),
    };

    println!("✅ Environment {} is up", ctx.vars.qualified_name());
    print_json(&outputs)
}
