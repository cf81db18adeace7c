//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use repo_delivery::output::OutputConfig;

use crate::commands;

/// Repo Delivery - Extract workspace modifications as a replayable patch delivery
#[derive(Parser, Debug)]
#[command(name = "repo-delivery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (overridden by RUST_LOG)
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Produce patches and install scripts for the workspace
    Deliver(commands::deliver::DeliverArgs),

    /// Report the state of every project without writing patches or scripts
    Inspect(commands::inspect::InspectArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    fn init_logging(&self) {
        let level = if self.quiet { "warn" } else { self.log_level.as_str() };
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
            .format_timestamp(None)
            .format_target(false)
            .try_init();
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging();
        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Deliver(args) => commands::deliver::execute(args, &output),
            Commands::Inspect(args) => commands::inspect::execute(args, &output),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
