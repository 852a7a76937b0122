//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;
use serde::Serialize;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Format a timestamp the way every table prints it; `-` when absent.
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One row of `list` output.
#[derive(Debug, Serialize)]
pub struct EntrySummary {
    pub group: String,
    pub title: String,
    pub user: String,
    pub url: String,
    pub modified: Option<DateTime<Utc>>,
}

/// Print a table of entries (Group, Title, User, URL, Modified).
pub fn print_entries_table(entries: &[EntrySummary]) {
    if entries.is_empty() {
        info("No entries in this vault yet.");
        tip("Run `pwvault add <TITLE>` to add your first entry.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Group", "Title", "User", "URL", "Modified"]);

    for e in entries {
        table.add_row(vec![
            e.group.clone(),
            e.title.clone(),
            e.user.clone(),
            e.url.clone(),
            format_time(e.modified),
        ]);
    }

    println!("{table}");
}

/// Print a two-column (Field, Value) table.
pub fn print_fields_table(rows: &[(String, String)]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Field", "Value"]);

    for (name, value) in rows {
        table.add_row(vec![name.clone(), value.clone()]);
    }

    println!("{table}");
}
