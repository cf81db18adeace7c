//! # Deliver Command Implementation
//!
//! Runs the full delivery: patches for every modified project, the install
//! and cleanup scripts, stray repository archives and the JSON diagnostics,
//! all written to the output folder.
//!
//! ```bash
//! repo-delivery deliver -w ~/aosp -o ./delivery -p falcon -t FALCON_V2.1 \
//!     --to-tag falcon-2.1 --track vendor-acme
//! ```

use anyhow::Result;
use clap::Args;
use repo_delivery::output::{emoji, report_summary, OutputConfig};

use super::run::{run_delivery, RunArgs};

/// Produce patches and install scripts for the workspace
#[derive(Args, Debug)]
pub struct DeliverArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Only report what would be delivered
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the `deliver` command.
pub fn execute(args: DeliverArgs, output: &OutputConfig) -> Result<()> {
    let mut options = args.run.into_options()?;
    options.dry_run |= args.dry_run;

    println!(
        "{} Delivering {} into {}",
        emoji(output, "📦", "[RUN]"),
        options.workspace.display(),
        options.output_folder.display()
    );
    let report = run_delivery(options)?;
    print!("{}", report_summary(output, &report));
    Ok(())
}
