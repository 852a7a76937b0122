//! `pwvault init`: create a new, empty vault.

use std::fs;

use crate::cli::output;
use crate::cli::{load_settings, prompt_new_password, vault_path, Cli, PASSWORD_ENV};
use crate::errors::{PwVaultError, Result};
use crate::vault::Document;

/// Execute the `init` command.
pub fn execute(cli: &Cli, name: Option<&str>, description: Option<&str>) -> Result<()> {
    let settings = load_settings()?;
    let path = vault_path(cli, &settings)?;

    // 1. Refuse to overwrite an existing vault.
    if path.exists() {
        output::tip("Use `pwvault add` to add entries to the existing vault.");
        return Err(PwVaultError::VaultAlreadyExists(path));
    }

    // 2. Create the parent directory if it doesn't exist.
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
            output::info(&format!("Created directory: {}", dir.display()));
        }
    }

    // 3. Prompt for a new password (with confirmation).
    let password = prompt_new_password(PASSWORD_ENV)?;

    // 4. Build the document and write it.
    let mut document = Document::new(&password)?;
    settings.apply(&mut document);
    if let Some(name) = name {
        document.set_name(name)?;
    }
    if let Some(description) = description {
        document.set_description(description)?;
    }
    document.save(&path)?;

    tracing::info!(path = %path.display(), "vault created");
    output::success(&format!("Vault created at {}", path.display()));

    output::tip("Run `pwvault add <TITLE>` to add an entry.");
    output::tip("Run `pwvault list` to see all entries.");

    Ok(())
}
