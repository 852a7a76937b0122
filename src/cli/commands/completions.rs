//! `pwvault completions`: generate shell completion scripts.
//!
//! Usage:
//!   pwvault completions bash > ~/.bash_completion.d/pwvault
//!   pwvault completions zsh
//!   pwvault completions fish

use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::Result;

/// Execute the `completions` command.
pub fn execute(shell: Shell) -> Result<()> {
    write_script(shell, &mut io::stdout())
}

fn write_script(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "pwvault", out);
    Ok(())
}
