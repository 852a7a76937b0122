//! `pwvault add`: create a new entry.

use chrono::Utc;
use zeroize::Zeroizing;

use crate::cli::commands::policy::generation_policy;
use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{PwVaultError, Result};
use crate::vault::{generator, GroupPath, RecordType};

/// Optional fields given on the command line.
pub struct NewEntry<'a> {
    pub group: Option<&'a str>,
    pub user: Option<&'a str>,
    pub url: Option<&'a str>,
    pub email: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub password: Option<&'a str>,
    pub generate: bool,
    pub policy: Option<&'a str>,
}

/// Execute the `add` command.
pub fn execute(cli: &Cli, title: &str, fields: &NewEntry<'_>) -> Result<()> {
    let mut vault = open_vault(cli)?;
    if vault.document.is_read_only() {
        return Err(PwVaultError::ReadOnly);
    }

    let group = fields.group.map(GroupPath::from).unwrap_or_default();
    if vault.document.entries().find_in_group(&group, title).is_some() {
        return Err(PwVaultError::CommandFailed(format!(
            "entry '{title}' already exists in group '{group}'"
        )));
    }

    let password = match fields.password {
        _ if fields.generate => {
            let policy = generation_policy(&vault.document, fields.policy, "", None)?;
            generator::generate(&policy)?
        }
        Some(p) => {
            output::warning("Password provided on command line; it may appear in shell history.");
            Zeroizing::new(p.to_string())
        }
        None => Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Password for {title}"))
                .allow_empty_password(true)
                .interact()
                .map_err(|e| PwVaultError::CommandFailed(format!("password prompt: {e}")))?,
        ),
    };

    // Creating through the collection keeps the entry attached, so later
    // writes are tracked.
    let track_modify = vault.document.tracks_modify();
    let mut entry = vault.document.entries_mut().entry_in_group(&group, title)?;
    if track_modify {
        entry.set_creation_time(Utc::now())?;
    }
    for (kind, value) in [
        (RecordType::UserName, fields.user),
        (RecordType::Url, fields.url),
        (RecordType::EmailAddress, fields.email),
        (RecordType::Notes, fields.notes),
    ] {
        if let Some(value) = value {
            entry.set_text(kind, value)?;
        }
    }
    if let Some(name) = fields.policy {
        entry.set_password_policy_name(name)?;
    }
    entry.set_password(&password)?;

    vault.save()?;
    tracing::info!(%title, %group, "entry added");
    output::success(&format!(
        "Entry '{title}' added ({} total)",
        vault.document.entries().len()
    ));
    if fields.generate {
        output::tip(&format!(
            "Generated a {}-character password. Run `pwvault show {title} --field password` to read it.",
            password.chars().count()
        ));
    }

    Ok(())
}
