//! `pwvault delete`: remove an entry from the vault.

use crate::cli::output;
use crate::cli::{confirm, open_vault, Cli};
use crate::errors::{PwVaultError, Result};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, title: &str, force: bool) -> Result<()> {
    let mut vault = open_vault(cli)?;
    if vault.document.entries().find(title).is_none() {
        return Err(PwVaultError::EntryNotFound(title.to_string()));
    }

    // Unless --force is set, ask for confirmation before deleting.
    if !force && !confirm(&format!("Delete entry '{title}'?"))? {
        output::info("Cancelled.");
        return Ok(());
    }

    vault.document.entries_mut().remove_title(title)?;
    vault.save()?;

    tracing::info!(%title, "entry deleted");
    output::success(&format!("Deleted entry '{title}'"));

    Ok(())
}
