//! # Completions Command Implementation
//!
//! ```bash
//! repo-delivery completions bash > ~/.local/share/bash-completion/completions/repo-delivery
//! repo-delivery completions zsh > ~/.zfunc/_repo-delivery
//! ```

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

const BIN_NAME: &str = "repo-delivery";

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell (bash, zsh, fish, powershell, elvish)
    #[arg(value_enum)]
    pub shell: Shell,
}

fn write_completions(shell: Shell, out: &mut dyn Write) {
    generate(shell, &mut Cli::command(), BIN_NAME, out);
}

pub fn execute(args: CompletionsArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    write_completions(args.shell, &mut lock);
    lock.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fish_completions_list_subcommands() {
        let mut buffer = Vec::new();
        write_completions(Shell::Fish, &mut buffer);
        let script = String::from_utf8(buffer).unwrap();
        assert!(script.contains("deliver"));
        assert!(script.contains("inspect"));
        assert!(script.contains("since-tag"));
    }
}
