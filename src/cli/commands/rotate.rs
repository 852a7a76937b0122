//! `pwvault rotate-key`: change the vault master password.
//!
//! The current password is checked again before the change, then the
//! vault is re-encrypted under fresh data keys and written atomically.

use crate::cli::output;
use crate::cli::{open_vault_keeping_password, prompt_new_password, Cli, NEW_PASSWORD_ENV};
use crate::errors::{PwVaultError, Result};

/// Execute the `rotate-key` command.
pub fn execute(cli: &Cli) -> Result<()> {
    // 1. Open the vault with the current password.
    output::info("Enter your current vault password.");
    let (mut vault, old_password) = open_vault_keeping_password(cli)?;
    if vault.document.is_read_only() {
        return Err(PwVaultError::ReadOnly);
    }

    // 2. Prompt for the new password.
    output::info("Choose your new vault password.");
    let new_password = prompt_new_password(NEW_PASSWORD_ENV)?;

    // 3. Swap the passphrase only if the current one matches.
    if !vault
        .document
        .try_change_passphrase(&old_password, &new_password)?
    {
        return Err(PwVaultError::PasswordMismatch);
    }

    // 4. Save atomically under fresh data keys.
    vault.save()?;

    tracing::info!(path = %vault.path.display(), "passphrase rotated");
    output::success(&format!(
        "Password rotated for {} ({} entries re-encrypted)",
        vault.path.display(),
        vault.document.entries().len()
    ));

    Ok(())
}
