//! `pwvault autotype`: print an entry's autotype keystrokes.
//!
//! The expanded form is what a key sender would type: literal keys in
//! key-sender notation with `{Command}` markers for actions it must
//! perform itself (two-factor code, delays).

use crate::cli::{open_vault, Cli};
use crate::errors::{PwVaultError, Result};
use crate::vault::{AutotypeToken, AutotypeTokens};

/// Execute the `autotype` command.
pub fn execute(cli: &Cli, title: &str, raw: bool) -> Result<()> {
    let mut vault = open_vault(cli)?;
    let entry = vault
        .document
        .entries_mut()
        .find_mut(title)
        .ok_or_else(|| PwVaultError::EntryNotFound(title.to_string()))?;

    let tokens: Vec<AutotypeToken> = if raw {
        AutotypeTokens::new(&entry.autotype()).collect()
    } else {
        entry.autotype_tokens()
    };
    println!("{}", render(&tokens));

    vault.save_if_changed()?;
    Ok(())
}

/// Keys are printed as is, commands inside braces.
fn render(tokens: &[AutotypeToken]) -> String {
    tokens
        .iter()
        .map(|token| match token {
            AutotypeToken::Key(key) => key.clone(),
            AutotypeToken::Command(command) => format!("{{{command}}}"),
        })
        .collect()
}
