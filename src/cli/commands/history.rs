//! `pwvault history`: show or configure an entry's password history.

use comfy_table::{ContentArrangement, Table};

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{PwVaultError, Result};

/// What to do with the history before printing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryChange {
    None,
    /// Turn on, keeping this many passwords (`None` = configured default).
    Enable(Option<usize>),
    Disable,
}

/// Execute the `history` command.
pub fn execute(cli: &Cli, title: &str, change: HistoryChange, reveal: bool) -> Result<()> {
    let mut vault = open_vault(cli)?;
    let default_max = vault.settings.history_max;
    let entry = vault
        .document
        .entries_mut()
        .find_mut(title)
        .ok_or_else(|| PwVaultError::EntryNotFound(title.to_string()))?;
    let mut history = entry.password_history()?;

    match change {
        HistoryChange::None => {}
        HistoryChange::Enable(max) => {
            history.set_maximum_count(max.unwrap_or(default_max))?;
            history.set_enabled(true)?;
        }
        // Disabling also forgets the stored passwords.
        HistoryChange::Disable => history.set_enabled(false)?,
    }

    let state = if history.is_enabled() { "on" } else { "off" };
    output::info(&format!(
        "History for '{title}' is {state}, keeping up to {} password(s)",
        history.maximum_count()
    ));

    if history.is_empty() {
        output::info("No previous passwords stored.");
    } else {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["First used", "Password"]);
        for item in history.iter() {
            let password = if reveal { item.password() } else { "********" };
            table.add_row(vec![
                output::format_time(Some(item.time_first_used())),
                password.to_string(),
            ]);
        }
        println!("{table}");
    }

    if vault.save_if_changed()? {
        tracing::info!(%title, ?change, "history updated");
        output::success("History settings saved.");
    }

    Ok(())
}
