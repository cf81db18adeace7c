//! # Repo Delivery CLI
//!
//! This is the binary entry point for the `repo-delivery` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Translating failures into a message on stderr and a distinguishing exit
//!   code (see `repo_delivery::exit_codes`).
//!
//! The delivery logic lives in the `repo_delivery` library; the binary is a
//! thin wrapper around it.

mod cli;
mod commands;

use clap::Parser;
use repo_delivery::error::Error;
use repo_delivery::exit_codes;

fn main() {
    let cli = cli::Cli::parse();
    if let Err(err) = cli.execute() {
        let code = err
            .downcast_ref::<Error>()
            .map(Error::exit_code)
            .unwrap_or(exit_codes::ERROR);
        eprintln!("Error: {:#}", err);
        std::process::exit(code);
    }
}
