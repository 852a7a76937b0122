//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod field_names;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{PwVaultError, Result};
use crate::vault::Document;

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable checked before prompting for the vault password.
pub const PASSWORD_ENV: &str = "PWVAULT_PASSWORD";

/// Environment variable holding the replacement password for `rotate-key`.
pub const NEW_PASSWORD_ENV: &str = "PWVAULT_NEW_PASSWORD";

/// pwvault CLI: Password Safe v3 vault manager.
#[derive(Parser)]
#[command(
    name = "pwvault",
    about = "Password Safe v3 (.psafe3) vault manager",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault file (default: `vault_file` from .pwvault.toml, else vault.psafe3)
    #[arg(long, global = true, env = "PWVAULT_FILE")]
    pub file: Option<String>,

    /// Open the vault read-only (no tracking, no saving)
    #[arg(long, global = true)]
    pub read_only: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new, empty vault
    Init {
        /// Database name stored in the vault header
        #[arg(long)]
        name: Option<String>,
        /// Database description stored in the vault header
        #[arg(long)]
        description: Option<String>,
    },

    /// List entries
    List {
        /// Only entries in this group (e.g. "Work.Mail")
        #[arg(short, long)]
        group: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show an entry's fields
    Show {
        /// Entry title
        title: String,
        /// Print secret fields in clear text
        #[arg(long)]
        reveal: bool,
        /// Print only this field's value (e.g. password, url, notes)
        #[arg(long)]
        field: Option<String>,
    },

    /// Add a new entry
    Add {
        /// Entry title
        title: String,
        /// Group path, segments separated by dots
        #[arg(short, long)]
        group: Option<String>,
        /// User name
        #[arg(short, long)]
        user: Option<String>,
        /// URL
        #[arg(long)]
        url: Option<String>,
        /// E-mail address
        #[arg(long)]
        email: Option<String>,
        /// Notes
        #[arg(long)]
        notes: Option<String>,
        /// Password (omit for interactive prompt)
        #[arg(short, long)]
        password: Option<String>,
        /// Generate the password instead of prompting
        #[arg(long, conflicts_with = "password")]
        generate: bool,
        /// Named policy to generate with; also recorded on the entry
        #[arg(long, value_name = "NAME", requires = "generate")]
        policy: Option<String>,
    },

    /// Update one field of an entry
    Set {
        /// Entry title
        title: String,
        /// Field name (e.g. password, user, url, notes, group)
        field: String,
        /// New value (omit for interactive prompt)
        value: Option<String>,
        /// Generate a new password (password field only)
        #[arg(long, conflicts_with = "value")]
        generate: bool,
        /// Named policy to generate with
        #[arg(long, value_name = "NAME", requires = "generate")]
        policy: Option<String>,
    },

    /// Delete an entry
    Delete {
        /// Entry title
        title: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show or configure an entry's password history
    History {
        /// Entry title
        title: String,
        /// Turn history on, keeping N passwords (default: history_max from config)
        #[arg(long, value_name = "N", conflicts_with = "disable")]
        enable: Option<Option<usize>>,
        /// Turn history off and forget stored passwords
        #[arg(long)]
        disable: bool,
        /// Print old passwords in clear text
        #[arg(long)]
        reveal: bool,
    },

    /// Print an entry's autotype keystrokes
    Autotype {
        /// Entry title
        title: String,
        /// Print the tokenized sequence without filling in entry fields
        #[arg(long)]
        raw: bool,
    },

    /// Manage named password policies
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Show vault header information
    Info,

    /// Change the vault's master password
    RotateKey,

    /// Show version information
    Version,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Policy subcommands.
#[derive(clap::Subcommand)]
pub enum PolicyAction {
    /// List named policies
    List,

    /// Add a named policy
    Add {
        /// Policy name
        name: String,
        /// Total password length
        #[arg(short, long, default_value = "12")]
        length: u16,
        /// Use lowercase letters (at least N)
        #[arg(long, value_name = "N")]
        lower: Option<u16>,
        /// Use uppercase letters (at least N)
        #[arg(long, value_name = "N")]
        upper: Option<u16>,
        /// Use digits (at least N)
        #[arg(long, value_name = "N")]
        digits: Option<u16>,
        /// Use symbols (at least N)
        #[arg(long, value_name = "N")]
        symbols: Option<u16>,
        /// Use hex digits only
        #[arg(long)]
        hex: bool,
        /// Avoid look-alike characters
        #[arg(long)]
        easy_vision: bool,
        /// Make the password pronounceable
        #[arg(long)]
        pronounceable: bool,
        /// Symbol set to draw from
        #[arg(long, value_name = "CHARS")]
        special: Option<String>,
    },

    /// Remove a named policy
    Remove {
        /// Policy name
        name: String,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Get the vault password, trying in order:
/// 1. `PWVAULT_PASSWORD` env var (CI/CD)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault password")
        .interact()
        .map_err(|e| PwVaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation (used by `init` and
/// `rotate-key`).
///
/// `env_var` is checked first for scripted/CI usage: `PWVAULT_PASSWORD`
/// for `init`, `PWVAULT_NEW_PASSWORD` for `rotate-key`.
/// Enforces a minimum password length.
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(env_var) {
        if !pw.is_empty() {
            if pw.chars().count() < MIN_PASSWORD_LEN {
                return Err(PwVaultError::CommandFailed(format!(
                    "password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose vault password")
            .with_confirmation(
                "Confirm vault password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| PwVaultError::CommandFailed(format!("password prompt: {e}")))?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

/// Project settings from the current directory.
pub fn load_settings() -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    Settings::load(&cwd)
}

/// Resolve the vault file: `--file` if given, else the configured one.
pub fn vault_path(cli: &Cli, settings: &Settings) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match &cli.file {
        Some(file) => cwd.join(file),
        None => settings.vault_path(&cwd),
    })
}

/// An opened vault together with where it came from.
pub struct OpenVault {
    pub path: PathBuf,
    pub settings: Settings,
    pub document: Document,
}

impl OpenVault {
    /// Write the document back if anything changed and writing is allowed.
    pub fn save_if_changed(&mut self) -> Result<bool> {
        if !self.document.has_changed() || self.document.is_read_only() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn save(&mut self) -> Result<()> {
        self.document.save(&self.path)?;
        tracing::info!(path = %self.path.display(), "vault saved");
        Ok(())
    }
}

/// Prompt for the password and open the vault with the project settings
/// and the `--read-only` flag applied.
pub fn open_vault(cli: &Cli) -> Result<OpenVault> {
    open_vault_keeping_password(cli).map(|(vault, _)| vault)
}

/// Like `open_vault`, also handing back the password that opened it.
pub fn open_vault_keeping_password(cli: &Cli) -> Result<(OpenVault, Zeroizing<String>)> {
    let settings = load_settings()?;
    let path = vault_path(cli, &settings)?;
    if !path.exists() {
        output::tip("Run `pwvault init` to create a vault.");
        return Err(PwVaultError::VaultNotFound(path));
    }

    let password = prompt_password()?;
    let mut document = Document::open(&path, &password)?;
    settings.apply(&mut document);
    document.set_read_only(cli.read_only);

    let vault = OpenVault {
        path,
        settings,
        document,
    };
    Ok((vault, password))
}

/// Ask a yes/no question, defaulting to no.
pub fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| PwVaultError::CommandFailed(format!("confirm prompt: {e}")))
}
