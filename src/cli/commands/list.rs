//! `pwvault list`: display entries in a table or as JSON.

use crate::cli::output::{self, EntrySummary};
use crate::cli::{open_vault, Cli};
use crate::errors::{PwVaultError, Result};
use crate::vault::{Entry, GroupPath, RecordType};

/// Execute the `list` command.
pub fn execute(cli: &Cli, group: Option<&str>, json: bool) -> Result<()> {
    let vault = open_vault(cli)?;
    let filter = group.map(GroupPath::from);

    let mut rows: Vec<EntrySummary> = vault
        .document
        .entries()
        .iter()
        .filter(|e| filter.as_ref().map_or(true, |g| in_group(e, g)))
        .map(summarize)
        .collect();
    rows.sort_by_cached_key(|r| (r.group.to_lowercase(), r.title.to_lowercase()));

    if json {
        let text = serde_json::to_string_pretty(&rows)
            .map_err(|e| PwVaultError::SerializationError(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    let name = vault.document.name();
    let label = if name.is_empty() {
        vault.path.display().to_string()
    } else {
        name
    };
    output::info(&format!("{label}: {} entr(ies)", rows.len()));
    output::print_entries_table(&rows);

    Ok(())
}

/// True when the entry sits in `group` or one of its subgroups.
fn in_group(entry: &Entry, group: &GroupPath) -> bool {
    if group.is_empty() {
        return true;
    }
    let wanted = group.segments();
    let actual = entry.group().segments();
    actual.len() >= wanted.len()
        && wanted
            .iter()
            .zip(&actual)
            .all(|(w, a)| w.eq_ignore_ascii_case(a))
}

/// Listing is not an access, so read the records directly.
fn summarize(entry: &Entry) -> EntrySummary {
    let records = entry.records();
    let text = |kind| {
        records
            .find(kind)
            .and_then(|r| r.text().ok())
            .unwrap_or_default()
    };
    EntrySummary {
        group: entry.group().to_string(),
        title: entry.title(),
        user: text(RecordType::UserName),
        url: text(RecordType::Url),
        modified: records
            .find(RecordType::LastModificationTime)
            .and_then(|r| r.time().ok().flatten()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_group_matches_subgroups() {
        let entry = Entry::with_group(&GroupPath::from("Work.Mail"), "Inbox").unwrap();
        assert!(in_group(&entry, &GroupPath::from("Work")));
        assert!(in_group(&entry, &GroupPath::from("work.mail")));
        assert!(!in_group(&entry, &GroupPath::from("Work.Mail.Old")));
        assert!(!in_group(&entry, &GroupPath::from("Home")));
    }

    #[test]
    fn summarize_reads_plain_fields() {
        let mut entry = Entry::with_title("Bank").unwrap();
        entry.set_user_name("alice").unwrap();
        let row = summarize(&entry);
        assert_eq!(row.title, "Bank");
        assert_eq!(row.user, "alice");
        assert_eq!(row.group, "");
    }
}
