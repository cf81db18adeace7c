//! # Inspect Command Implementation
//!
//! Runs every check of a delivery in dry-run mode and prints one line per
//! project. Dirty projects are reported instead of stopping the run, and only
//! the JSON diagnostics are written.

use anyhow::Result;
use clap::Args;
use repo_delivery::output::{report_summary, report_table, OutputConfig};

use super::run::{run_delivery, RunArgs};

/// Report the state of every project
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `inspect` command.
pub fn execute(args: InspectArgs, output: &OutputConfig) -> Result<()> {
    let mut options = args.run.into_options()?;
    options.dry_run = true;

    let report = run_delivery(options)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report_table(output, &report));
        println!();
        print!("{}", report_summary(output, &report));
    }
    Ok(())
}
