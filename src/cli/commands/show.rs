//! `pwvault show`: print an entry's fields.
//!
//! Values are read through the tracked accessors, so with access
//! tracking on the entry's LastAccessTime moves and the vault is saved.

use crate::cli::field_names::{field_name, is_secret, parse_field, read_value};
use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{PwVaultError, Result};
use crate::vault::RecordType;

/// Placeholder for hidden secrets.
const MASK: &str = "********";

/// Fields shown in the table, in display order.
const SHOWN: &[RecordType] = &[
    RecordType::Group,
    RecordType::Title,
    RecordType::UserName,
    RecordType::Password,
    RecordType::Url,
    RecordType::EmailAddress,
    RecordType::Notes,
    RecordType::RunCommand,
    RecordType::Autotype,
    RecordType::PasswordPolicyName,
    RecordType::TwoFactorKey,
    RecordType::CreditCardNumber,
    RecordType::CreditCardExpiration,
    RecordType::CreditCardVerificationValue,
    RecordType::CreditCardPin,
    RecordType::QRCode,
];

/// Execute the `show` command.
pub fn execute(cli: &Cli, title: &str, reveal: bool, field: Option<&str>) -> Result<()> {
    let mut vault = open_vault(cli)?;
    let entry = vault
        .document
        .entries_mut()
        .find_mut(title)
        .ok_or_else(|| PwVaultError::EntryNotFound(title.to_string()))?;

    match field {
        // A single field prints the bare value for scripts.
        Some(name) => {
            let kind = parse_field(name)?;
            let value = read_value(entry, kind)?;
            println!("{}", value.as_str());
        }
        None => {
            let mut rows = Vec::new();
            for &kind in SHOWN {
                if !entry.records().contains(kind) {
                    continue;
                }
                let value = read_value(entry, kind)?;
                let shown = if is_secret(kind) && !reveal && !value.is_empty() {
                    MASK.to_string()
                } else {
                    value.to_string()
                };
                rows.push((field_name(kind).unwrap_or("?").to_string(), shown));
            }

            rows.push(("uuid".into(), entry.uuid().map(|u| u.to_string()).unwrap_or_default()));
            rows.push(("created".into(), output::format_time(entry.creation_time())));
            rows.push(("modified".into(), output::format_time(entry.last_modification_time())));
            rows.push((
                "password-changed".into(),
                output::format_time(entry.password_modification_time()),
            ));
            rows.push(("password-expires".into(), output::format_time(entry.password_expiry_time())));
            rows.push(("accessed".into(), output::format_time(entry.last_access_time())));

            output::print_fields_table(&rows);
            if !reveal {
                output::tip("Use --reveal to print secret fields.");
            }
        }
    }

    vault.save_if_changed()?;
    Ok(())
}
