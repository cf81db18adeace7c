//! # CLI Command Implementations
//!
//! Each subcommand of `repo-delivery` lives in its own file and exposes:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and calls into the
//!   `repo_delivery` library.
//!
//! `deliver` and `inspect` share the run options of [`run::RunArgs`].

pub mod completions;
pub mod deliver;
pub mod inspect;
pub mod run;
