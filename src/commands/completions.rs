//! # Completions Command Implementation
//!
//! `pctl completions <shell>` prints a completion script for `install`,
//! `upgrade` and their flags to stdout.
//!
//! ```bash
//! pctl completions bash > ~/.local/share/bash-completion/completions/pctl
//! pctl completions zsh > ~/.zfunc/_pctl
//! ```

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use std::io;

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Writes the completion script for `args.shell` to stdout.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, bin_name, &mut io::stdout());
    Ok(())
}
