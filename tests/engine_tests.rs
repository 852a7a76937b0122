//! Integration tests for the vault engine: load/save, tamper detection,
//! change tracking and read-only documents.

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use pwvault::errors::PwVaultError;
use pwvault::vault::{
    Document, Entry, GroupPath, HeaderType, NamedPasswordPolicy, Record, RecordType,
    DEFAULT_VERSION,
};

const GOLDEN_UUID: &str = "0ee8f0ae-1e8c-4f3b-9a2d-6c5b8e7d4f10";

/// A small vault without save stamps, so every field fits in few blocks.
fn small_vault(passphrase: &str) -> Vec<u8> {
    let mut doc = Document::new(passphrase).unwrap();
    doc.set_track_modify(false);
    let mut entry = Entry::with_title("t").unwrap();
    entry.set_user_name("u").unwrap();
    doc.entries_mut().add(entry).unwrap();
    doc.to_bytes().unwrap()
}

// ---------------------------------------------------------------------------
// Golden layout
// ---------------------------------------------------------------------------

#[test]
fn golden_document_under_passphrase_123() {
    let uuid = Uuid::parse_str(GOLDEN_UUID).unwrap();
    let mut doc = Document::new("123").unwrap();
    doc.set_uuid(uuid).unwrap();
    let bytes = doc.to_bytes().unwrap();

    let len = bytes.len();
    assert!(len >= 200);
    assert_eq!(&bytes[..4], b"PWS3");
    assert_eq!(u32::from_le_bytes(bytes[36..40].try_into().unwrap()), 2048);
    assert_eq!(&bytes[len - 48..len - 32], b"PWS3-EOFPWS3-EOF");
    assert_eq!((len - 152 - 48) % 16, 0);

    let loaded = Document::load(&bytes, "123").unwrap();
    assert_eq!(loaded.version(), 0x030D);
    assert_eq!(loaded.version(), DEFAULT_VERSION);
    assert_eq!(loaded.uuid(), Some(uuid));
    assert_eq!(loaded.headers().get(0).unwrap().kind(), HeaderType::Version);
    assert!(loaded.entries().is_empty());
    assert!(!loaded.has_changed());
}

#[test]
fn each_save_uses_fresh_salt_and_keys() {
    let mut doc = Document::new("123").unwrap();
    let a = doc.to_bytes().unwrap();
    let b = doc.to_bytes().unwrap();
    assert_ne!(a[4..36], b[4..36]);
    assert_ne!(a[72..152], b[72..152]);
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn entries_survive_a_round_trip() {
    let created = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
    let mut doc = Document::new("correct horse").unwrap();
    doc.set_name("Family").unwrap();
    doc.set_description("shared logins").unwrap();

    let mut entry = Entry::with_group(&GroupPath::from("Home.Bank"), "Checking").unwrap();
    entry.set_user_name("alice").unwrap();
    entry.set_password("s3cret!").unwrap();
    entry.set_url("https://bank.example").unwrap();
    entry.set_notes("line one\nline two").unwrap();
    entry.set_two_factor_key(&[0, 1, 2, 250]).unwrap();
    entry.set_creation_time(created).unwrap();
    entry
        .records_mut()
        .add(Record::with_bytes(RecordType::Unknown(0x60), &[9, 8, 7]).unwrap())
        .unwrap();
    doc.entries_mut().add(entry).unwrap();
    doc.entries_mut().add(Entry::with_title("Second").unwrap()).unwrap();

    let bytes = doc.to_bytes().unwrap();
    assert!(!doc.has_changed());

    let mut loaded = Document::load(&bytes, "correct horse").unwrap();
    assert!(!loaded.has_changed());
    assert_eq!(loaded.name(), "Family");
    assert_eq!(loaded.description(), "shared logins");
    assert_eq!(loaded.entries().len(), 2);

    let entry = loaded.entries_mut().find_mut("checking").unwrap();
    assert_eq!(entry.group().segments(), vec!["Home", "Bank"]);
    assert_eq!(entry.user_name(), "alice");
    assert_eq!(entry.password().as_str(), "s3cret!");
    assert_eq!(entry.url(), "https://bank.example");
    assert_eq!(entry.notes(), "line one\nline two");
    assert_eq!(entry.two_factor_key().unwrap().as_slice(), &[0, 1, 2, 250]);
    assert_eq!(entry.creation_time(), Some(created));

    let unknown = entry.records().find(RecordType::Unknown(0x60)).unwrap();
    assert_eq!(unknown.bytes().unwrap().as_slice(), &[9, 8, 7]);
}

#[test]
fn save_stamps_survive_a_round_trip() {
    let mut doc = Document::new("pw").unwrap();
    let bytes = doc.to_bytes().unwrap();
    let loaded = Document::load(&bytes, "pw").unwrap();

    assert!(loaded.last_save_time().is_some());
    assert!(loaded.last_save_application().starts_with("pwvault V"));
}

#[test]
fn named_policies_survive_a_round_trip() {
    let mut doc = Document::new("pw").unwrap();
    doc.named_policies_mut()
        .unwrap()
        .add(NamedPasswordPolicy::new("Web", 20).unwrap())
        .unwrap();
    let bytes = doc.to_bytes().unwrap();

    let loaded = Document::load(&bytes, "pw").unwrap();
    let policies = loaded.named_policies();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].name(), "Web");
    assert_eq!(policies[0].policy().total_password_length(), 20);
}

#[test]
fn password_history_survives_a_round_trip() {
    let mut doc = Document::new("pw").unwrap();
    {
        let mut entry = doc.entries_mut().entry("Mail").unwrap();
        entry.set_password("first").unwrap();
        let mut history = entry.password_history().unwrap();
        history.set_maximum_count(2).unwrap();
        history.set_enabled(true).unwrap();
        entry.set_password("second").unwrap();
        entry.set_password("third").unwrap();
        entry.set_password("fourth").unwrap();
    }
    let bytes = doc.to_bytes().unwrap();

    let mut loaded = Document::load(&bytes, "pw").unwrap();
    let entry = loaded.entries_mut().find_mut("Mail").unwrap();
    assert_eq!(entry.password().as_str(), "fourth");
    let history = entry.password_history().unwrap();
    assert!(history.is_enabled());
    let old: Vec<&str> = history.iter().map(|i| i.password()).collect();
    assert_eq!(old, vec!["second", "third"]);
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn wrong_passphrase_is_a_format_error() {
    let bytes = small_vault("right");
    let err = Document::load(&bytes, "wrong").unwrap_err();
    assert!(matches!(err, PwVaultError::UnrecognizedFormat(_)));
}

#[test]
fn short_or_foreign_data_is_rejected() {
    assert!(matches!(
        Document::load(&[0u8; 199], "pw"),
        Err(PwVaultError::UnrecognizedFormat(_))
    ));

    let mut bytes = small_vault("pw");
    bytes[0] = b'X';
    assert!(matches!(
        Document::load(&bytes, "pw"),
        Err(PwVaultError::UnrecognizedFormat(_))
    ));
}

#[test]
fn single_byte_flips_are_detected() {
    let bytes = small_vault("pw");
    let len = bytes.len();

    for offset in 0..len {
        // An IV flip lands in the first block, whose padding is not
        // authenticated.
        if (136..152).contains(&offset) {
            continue;
        }
        let mut damaged = bytes.clone();
        damaged[offset] ^= 0x01;
        assert!(
            Document::load(&damaged, "pw").is_err(),
            "flip at offset {offset} of {len} went unnoticed"
        );
    }
}

#[test]
fn changed_iteration_count_fails_the_passphrase_check() {
    let bytes = small_vault("pw");
    for offset in 36..40 {
        let mut damaged = bytes.clone();
        damaged[offset] ^= 0x01;
        assert!(matches!(
            Document::load(&damaged, "pw"),
            Err(PwVaultError::UnrecognizedFormat(_))
        ));
    }
}

#[test]
fn truncated_files_are_rejected() {
    let bytes = small_vault("pw");
    for cut in [1, 16, 32, 48] {
        assert!(Document::load(&bytes[..bytes.len() - cut], "pw").is_err());
    }
}

#[test]
fn old_format_version_is_unsupported() {
    let mut doc = Document::new("pw").unwrap();
    doc.set_version(0x0200).unwrap();
    let bytes = doc.to_bytes().unwrap();

    let err = Document::load(&bytes, "pw").unwrap_err();
    assert!(matches!(err, PwVaultError::UnsupportedVersion(0x0200)));
}

// ---------------------------------------------------------------------------
// Data keys
// ---------------------------------------------------------------------------

#[test]
fn known_data_keys_open_the_vault_without_passphrase() {
    let mut keys = [0u8; 64];
    for (i, b) in keys.iter_mut().enumerate() {
        *b = i as u8;
    }

    let mut doc = Document::new("pw").unwrap();
    doc.entries_mut().add(Entry::with_title("x").unwrap()).unwrap();
    let bytes = doc.to_bytes_with_keys("pw", &keys).unwrap();

    let mut by_keys = Document::load_with_keys(&bytes, &keys).unwrap();
    assert_eq!(by_keys.entries().len(), 1);
    assert!(!by_keys.has_passphrase());
    assert!(matches!(
        by_keys.to_bytes(),
        Err(PwVaultError::MissingPassphrase)
    ));

    assert!(Document::load(&bytes, "pw").is_ok());

    let mut other = keys;
    other[0] ^= 0xFF;
    assert!(Document::load_with_keys(&bytes, &other).is_err());
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

#[test]
fn edits_stamp_creation_then_modification_times() {
    let mut doc = Document::new("pw").unwrap();
    let mut entry = doc.entries_mut().entry("Mail").unwrap();

    entry.set_user_name("bob").unwrap();
    assert!(entry.creation_time().is_some());
    assert!(entry.last_modification_time().is_none());

    entry.set_password("pw2").unwrap();
    assert!(entry.last_modification_time().is_some());
    assert!(entry.password_modification_time().is_some());
}

#[test]
fn reading_a_secret_stamps_last_access() {
    let mut doc = Document::new("pw").unwrap();
    doc.entries_mut().entry("Mail").unwrap().set_password("x").unwrap();
    let bytes = doc.to_bytes().unwrap();

    let mut loaded = Document::load(&bytes, "pw").unwrap();
    let entry = loaded.entries_mut().find_mut("Mail").unwrap();
    assert!(entry.last_access_time().is_none());
    let _ = entry.password();
    assert!(entry.last_access_time().is_some());
    assert!(loaded.has_changed());
}

#[test]
fn tracking_can_be_switched_off() {
    let mut doc = Document::new("pw").unwrap();
    doc.set_track_access(false);
    doc.set_track_modify(false);
    let mut entry = doc.entries_mut().entry("Mail").unwrap();
    entry.set_user_name("bob").unwrap();
    let _ = entry.password();

    assert!(entry.creation_time().is_none());
    assert!(entry.last_access_time().is_none());
    assert!(doc.has_changed());
}

// ---------------------------------------------------------------------------
// Read-only
// ---------------------------------------------------------------------------

#[test]
fn read_only_document_reads_without_mutating() {
    let mut doc = Document::new("pw").unwrap();
    doc.entries_mut().entry("Mail").unwrap().set_password("x").unwrap();
    let bytes = doc.to_bytes().unwrap();

    let mut loaded = Document::load(&bytes, "pw").unwrap();
    loaded.set_read_only(true);

    let entry = loaded.entries_mut().find_mut("Mail").unwrap();
    assert_eq!(entry.password().as_str(), "x");
    assert!(entry.last_access_time().is_none());
    assert!(matches!(entry.set_notes("n"), Err(PwVaultError::ReadOnly)));

    let dummy = loaded.entries_mut().entry("Nope").unwrap();
    assert!(dummy.is_detached());
    assert_eq!(loaded.entries().len(), 1);
    assert!(matches!(loaded.set_name("x"), Err(PwVaultError::ReadOnly)));
    assert!(!loaded.has_changed());
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn save_and_open_through_the_filesystem() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("team.psafe3");

    let mut doc = Document::new("pw").unwrap();
    doc.entries_mut().entry("Mail").unwrap().set_user_name("a").unwrap();
    doc.save(&path).unwrap();
    assert!(!doc.has_changed());

    let names: Vec<_> = std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("team.psafe3")]);

    let opened = Document::open(&path, "pw").unwrap();
    assert_eq!(opened.entries().len(), 1);
}

#[test]
fn opening_a_missing_file_names_it() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("missing.psafe3");
    assert!(matches!(
        Document::open(&path, "pw"),
        Err(PwVaultError::VaultNotFound(p)) if p == path
    ));
}

#[test]
fn rotated_passphrase_is_required_after_save() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("v.psafe3");

    let mut doc = Document::new("old-pass").unwrap();
    assert!(!doc.try_change_passphrase("nope", "new-pass").unwrap());
    assert!(doc.try_change_passphrase("old-pass", "new-pass").unwrap());
    doc.save(&path).unwrap();

    assert!(Document::open(&path, "old-pass").is_err());
    assert!(Document::open(&path, "new-pass").is_ok());
}
