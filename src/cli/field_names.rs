//! Mapping between user-facing field names and record types.
//!
//! Names are matched case-insensitively and accept `-` or `_` between
//! words, so `user`, `UserName` and `user_name` all mean the same field.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zeroize::Zeroizing;

use crate::errors::{PwVaultError, Result};
use crate::vault::{Entry, GroupPath, RecordType};

/// Fields `set` and `show --field` understand, with their canonical name.
const FIELDS: &[(&str, RecordType)] = &[
    ("title", RecordType::Title),
    ("group", RecordType::Group),
    ("user", RecordType::UserName),
    ("password", RecordType::Password),
    ("notes", RecordType::Notes),
    ("url", RecordType::Url),
    ("email", RecordType::EmailAddress),
    ("autotype", RecordType::Autotype),
    ("run-command", RecordType::RunCommand),
    ("policy-name", RecordType::PasswordPolicyName),
    ("two-factor-key", RecordType::TwoFactorKey),
    ("card-number", RecordType::CreditCardNumber),
    ("card-expiration", RecordType::CreditCardExpiration),
    ("card-cvv", RecordType::CreditCardVerificationValue),
    ("card-pin", RecordType::CreditCardPin),
    ("qr-code", RecordType::QRCode),
];

/// Extra spellings accepted on input.
const ALIASES: &[(&str, &str)] = &[
    ("username", "user"),
    ("user-name", "user"),
    ("e-mail", "email"),
    ("emailaddress", "email"),
    ("email-address", "email"),
    ("runcommand", "run-command"),
    ("totp", "two-factor-key"),
    ("credit-card-number", "card-number"),
    ("credit-card-expiration", "card-expiration"),
    ("credit-card-verification-value", "card-cvv"),
    ("credit-card-pin", "card-pin"),
    ("qrcode", "qr-code"),
];

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

/// Resolve a field name given on the command line.
pub fn parse_field(name: &str) -> Result<RecordType> {
    let name = normalize(name);
    let name = ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(name);

    FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            let known: Vec<&str> = FIELDS.iter().map(|(field, _)| *field).collect();
            PwVaultError::InvalidArgument(format!(
                "unknown field '{name}' (known fields: {})",
                known.join(", ")
            ))
        })
}

/// Canonical display name of a record type, if it has one.
pub fn field_name(kind: RecordType) -> Option<&'static str> {
    FIELDS
        .iter()
        .find(|(_, k)| *k == kind)
        .map(|(field, _)| *field)
}

/// Fields whose values are hidden unless `--reveal` is given.
pub fn is_secret(kind: RecordType) -> bool {
    matches!(
        kind,
        RecordType::Password
            | RecordType::TwoFactorKey
            | RecordType::CreditCardNumber
            | RecordType::CreditCardVerificationValue
            | RecordType::CreditCardPin
    )
}

/// Current value of a field as text. Binary fields come back as base64.
/// Goes through the tracked accessors, so this counts as an access.
pub fn read_value(entry: &mut Entry, kind: RecordType) -> Result<Zeroizing<String>> {
    let value = match kind {
        RecordType::Group => entry.group().to_string(),
        RecordType::TwoFactorKey => {
            let key = entry.two_factor_key()?;
            BASE64.encode(key.as_slice())
        }
        _ => entry.text(kind)?,
    };
    Ok(Zeroizing::new(value))
}

/// Store a value given as text. Binary fields expect base64.
pub fn write_value(entry: &mut Entry, kind: RecordType, value: &str) -> Result<()> {
    match kind {
        RecordType::Group => entry.set_group(&GroupPath::from(value)),
        RecordType::TwoFactorKey => {
            let key = Zeroizing::new(BASE64.decode(value.trim()).map_err(|e| {
                PwVaultError::InvalidArgument(format!("two-factor-key must be base64: {e}"))
            })?);
            entry.set_two_factor_key(&key)
        }
        _ => entry.set_text(kind, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_parse() {
        assert_eq!(parse_field("password").unwrap(), RecordType::Password);
        assert_eq!(parse_field("qr-code").unwrap(), RecordType::QRCode);
    }

    #[test]
    fn aliases_and_spellings_parse() {
        assert_eq!(parse_field("UserName").unwrap(), RecordType::UserName);
        assert_eq!(parse_field("user_name").unwrap(), RecordType::UserName);
        assert_eq!(parse_field("E-Mail").unwrap(), RecordType::EmailAddress);
        assert_eq!(parse_field("totp").unwrap(), RecordType::TwoFactorKey);
    }

    #[test]
    fn unknown_field_lists_known_ones() {
        let err = parse_field("shoe-size").unwrap_err().to_string();
        assert!(err.contains("shoe-size"));
        assert!(err.contains("password"));
    }

    #[test]
    fn every_field_has_a_name() {
        for (name, kind) in FIELDS {
            assert_eq!(field_name(*kind), Some(*name));
        }
        assert_eq!(field_name(RecordType::CreationTime), None);
    }

    #[test]
    fn binary_values_travel_as_base64() {
        let mut entry = Entry::with_title("otp").unwrap();
        write_value(&mut entry, RecordType::TwoFactorKey, "AAEC/w==").unwrap();
        assert_eq!(
            entry.two_factor_key().unwrap().as_slice(),
            &[0x00, 0x01, 0x02, 0xff]
        );
        assert_eq!(
            read_value(&mut entry, RecordType::TwoFactorKey)
                .unwrap()
                .as_str(),
            "AAEC/w=="
        );
    }

    #[test]
    fn bad_base64_is_rejected() {
        let mut entry = Entry::with_title("otp").unwrap();
        let err = write_value(&mut entry, RecordType::TwoFactorKey, "not base64!");
        assert!(matches!(err, Err(PwVaultError::InvalidArgument(_))));
    }

    #[test]
    fn group_values_are_paths() {
        let mut entry = Entry::with_title("mail").unwrap();
        write_value(&mut entry, RecordType::Group, "Work.Mail").unwrap();
        assert_eq!(entry.group().segments(), vec!["Work", "Mail"]);
        assert_eq!(
            read_value(&mut entry, RecordType::Group).unwrap().as_str(),
            "Work.Mail"
        );
    }
}
