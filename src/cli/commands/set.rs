//! `pwvault set`: update one field of an entry.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cli::commands::policy::generation_policy;
use crate::cli::field_names::{is_secret, parse_field, write_value};
use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{PwVaultError, Result};
use crate::vault::{generator, RecordType};

/// Where the new value comes from.
#[derive(Debug, Clone, Copy)]
pub enum NewValue<'a> {
    /// Given on the command line, or `None` to read stdin or prompt.
    Given(Option<&'a str>),
    /// Generated password, optionally from a named policy.
    Generate(Option<&'a str>),
}

/// Execute the `set` command.
pub fn execute(cli: &Cli, title: &str, field: &str, value: NewValue<'_>) -> Result<()> {
    let kind = parse_field(field)?;

    let value = match value {
        NewValue::Given(value) => value,
        NewValue::Generate(policy) => {
            if kind != RecordType::Password {
                return Err(PwVaultError::InvalidArgument(
                    "--generate only applies to the password field".into(),
                ));
            }
            return set_generated(cli, title, policy);
        }
    };

    // Determine the value from one of three sources.
    let new_value = if let Some(v) = value {
        // Source 1: Inline value on the command line.
        if is_secret(kind) {
            output::warning("Value provided on command line; it may appear in shell history.");
        }
        Zeroizing::new(v.to_string())
    } else if !io::stdin().is_terminal() {
        // Source 2: Piped input (stdin is not a terminal).
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = Zeroizing::new(buf.trim_end().to_string());
        buf.clear();
        trimmed
    } else if is_secret(kind) {
        // Source 3: Interactive prompt, hidden for secrets.
        Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Enter {field} for {title}"))
                .allow_empty_password(true)
                .interact()
                .map_err(|e| PwVaultError::CommandFailed(format!("input prompt: {e}")))?,
        )
    } else {
        Zeroizing::new(
            dialoguer::Input::<String>::new()
                .with_prompt(format!("Enter {field} for {title}"))
                .allow_empty(true)
                .interact_text()
                .map_err(|e| PwVaultError::CommandFailed(format!("input prompt: {e}")))?,
        )
    };

    let mut vault = open_vault(cli)?;
    let entry = vault
        .document
        .entries_mut()
        .find_mut(title)
        .ok_or_else(|| PwVaultError::EntryNotFound(title.to_string()))?;
    write_value(entry, kind, &new_value)?;

    if vault.save_if_changed()? {
        tracing::info!(%title, field = ?kind, "entry updated");
        output::success(&format!("Updated {field} of '{title}'"));
    } else {
        output::info(&format!("{field} of '{title}' is unchanged"));
    }

    Ok(())
}

/// Replace the password with one generated from the entry's policy, or
/// from the named `policy` when given.
fn set_generated(cli: &Cli, title: &str, policy: Option<&str>) -> Result<()> {
    let mut vault = open_vault(cli)?;
    let entry = vault
        .document
        .entries_mut()
        .find_mut(title)
        .ok_or_else(|| PwVaultError::EntryNotFound(title.to_string()))?;
    let entry_policy_name = entry.password_policy_name();
    let own_policy = entry
        .records()
        .contains(RecordType::PasswordPolicy)
        .then(|| entry.password_policy());

    let policy = generation_policy(&vault.document, policy, &entry_policy_name, own_policy)?;
    let password = generator::generate(&policy)?;

    let entry = vault
        .document
        .entries_mut()
        .find_mut(title)
        .ok_or_else(|| PwVaultError::EntryNotFound(title.to_string()))?;
    entry.set_password(&password)?;
    vault.save()?;

    tracing::info!(%title, "password regenerated");
    output::success(&format!(
        "Generated a new {}-character password for '{title}'",
        password.chars().count()
    ));
    Ok(())
}
