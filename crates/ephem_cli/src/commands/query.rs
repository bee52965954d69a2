//! Query command - Report whether an environment exists.

use anyhow::{bail, Result};

use ephem_core::{LifecycleCommand, Outcome};

use super::EnvArgs;

pub async fn execute(args: EnvArgs) -> Result<()> {
    let (_, outcome) = super::run(LifecycleCommand::Query, args.options(), &args.vars_file).await?;

    let status = match outcome {
        Outcome::Queried(status) => status,
        other => bail!("Unexpected result for query: {:?}", other),
    };

    let name = format!("{}-{}", status.project, status.environment);
    if status.exists {
        println!("✅ {} exists ({} resource(s))", name, status.resources.len());
        for resource in &status.resources {
            println!("   - {}", resource);
        }
    } else {
        println!("⚪ {} does not exist", name);
    }
    println!("   State: s3://{}/{}", status.state_bucket, status.state_key);
    Ok(())
}
