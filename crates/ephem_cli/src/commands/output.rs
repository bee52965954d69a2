//! Output command - Print Terraform outputs.

use anyhow::{bail, Result};
use clap::Args;

use ephem_core::{LifecycleCommand, Outcome};

use super::{print_json, EnvArgs};

#[derive(Args, Debug)]
pub struct OutputArgs {
    #[command(flatten)]
    pub env: EnvArgs,

    /// Print a single output instead of all of them
    #[arg(long)]
    pub name: Option<String>,
}

pub async fn execute(args: OutputArgs) -> Result<()> {
    let mut options = args.env.options();
    options.output_name = args.name;

    let (_, outcome) = super::run(LifecycleCommand::Output, options, &args.env.vars_file).await?;

    match outcome {
        Outcome::Outputs(value) => print_json(&value),
        other => bail!("Unexpected result for output: {:?}", other),
    }
}
