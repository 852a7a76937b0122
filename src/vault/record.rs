//! Entry records and the per-entry record collection.
//!
//! The collection is where the change and access policy lives. Every
//! write that actually changes a value marks the owning document dirty
//! and, when modification tracking is on, refreshes the entry's
//! creation/modification timestamps. Reads of anything but the display
//! fields refresh `LastAccessTime` when access tracking is on.
//!
//! A collection that is not attached to a document (an entry that was
//! never added, or was removed) tracks nothing and is never read-only.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::document::DocumentState;
use super::field::{
    encode_text, encode_time, encode_uuid, insertion_slot, now, occurrence_of, position_of,
    DataType, Field, FieldKind, END_OF_ENTRY,
};
use super::history::PasswordHistory;
use crate::errors::{PwVaultError, Result};

/// Autotype sequence given to freshly created Autotype records.
pub const DEFAULT_AUTOTYPE: &str = r"\u\t\p\n";

/// An entry field.
pub type Record = Field<RecordType>;

// ---------------------------------------------------------------------------
// RecordType
// ---------------------------------------------------------------------------

/// Record type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Uuid,
    Group,
    Title,
    UserName,
    Notes,
    Password,
    CreationTime,
    PasswordModificationTime,
    LastAccessTime,
    PasswordExpiryTime,
    LastModificationTime,
    Url,
    Autotype,
    PasswordHistory,
    PasswordPolicy,
    PasswordExpiryInterval,
    RunCommand,
    DoubleClickAction,
    EmailAddress,
    ProtectedEntry,
    OwnSymbolsForPassword,
    ShiftDoubleClickAction,
    PasswordPolicyName,
    EntryKeyboardShortcut,
    TwoFactorKey,
    CreditCardNumber,
    CreditCardExpiration,
    CreditCardVerificationValue,
    CreditCardPin,
    QRCode,
    EndOfEntry,
    Unknown(u8),
}

impl RecordType {
    /// The four timestamps maintained by change/access tracking.
    pub fn is_tracking_timestamp(self) -> bool {
        matches!(
            self,
            RecordType::CreationTime
                | RecordType::PasswordModificationTime
                | RecordType::LastModificationTime
                | RecordType::LastAccessTime
        )
    }
}

impl FieldKind for RecordType {
    fn code(self) -> u8 {
        match self {
            RecordType::Uuid => 0x01,
            RecordType::Group => 0x02,
            RecordType::Title => 0x03,
            RecordType::UserName => 0x04,
            RecordType::Notes => 0x05,
            RecordType::Password => 0x06,
            RecordType::CreationTime => 0x07,
            RecordType::PasswordModificationTime => 0x08,
            RecordType::LastAccessTime => 0x09,
            RecordType::PasswordExpiryTime => 0x0a,
            RecordType::LastModificationTime => 0x0c,
            RecordType::Url => 0x0d,
            RecordType::Autotype => 0x0e,
            RecordType::PasswordHistory => 0x0f,
            RecordType::PasswordPolicy => 0x10,
            RecordType::PasswordExpiryInterval => 0x11,
            RecordType::RunCommand => 0x12,
            RecordType::DoubleClickAction => 0x13,
            RecordType::EmailAddress => 0x14,
            RecordType::ProtectedEntry => 0x15,
            RecordType::OwnSymbolsForPassword => 0x16,
            RecordType::ShiftDoubleClickAction => 0x17,
            RecordType::PasswordPolicyName => 0x18,
            RecordType::EntryKeyboardShortcut => 0x19,
            RecordType::TwoFactorKey => 0x1b,
            RecordType::CreditCardNumber => 0x1c,
            RecordType::CreditCardExpiration => 0x1d,
            RecordType::CreditCardVerificationValue => 0x1e,
            RecordType::CreditCardPin => 0x1f,
            RecordType::QRCode => 0x20,
            RecordType::EndOfEntry => END_OF_ENTRY,
            RecordType::Unknown(code) => code,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            0x01 => RecordType::Uuid,
            0x02 => RecordType::Group,
            0x03 => RecordType::Title,
            0x04 => RecordType::UserName,
            0x05 => RecordType::Notes,
            0x06 => RecordType::Password,
            0x07 => RecordType::CreationTime,
            0x08 => RecordType::PasswordModificationTime,
            0x09 => RecordType::LastAccessTime,
            0x0a => RecordType::PasswordExpiryTime,
            0x0c => RecordType::LastModificationTime,
            0x0d => RecordType::Url,
            0x0e => RecordType::Autotype,
            0x0f => RecordType::PasswordHistory,
            0x10 => RecordType::PasswordPolicy,
            0x11 => RecordType::PasswordExpiryInterval,
            0x12 => RecordType::RunCommand,
            0x13 => RecordType::DoubleClickAction,
            0x14 => RecordType::EmailAddress,
            0x15 => RecordType::ProtectedEntry,
            0x16 => RecordType::OwnSymbolsForPassword,
            0x17 => RecordType::ShiftDoubleClickAction,
            0x18 => RecordType::PasswordPolicyName,
            0x19 => RecordType::EntryKeyboardShortcut,
            0x1b => RecordType::TwoFactorKey,
            0x1c => RecordType::CreditCardNumber,
            0x1d => RecordType::CreditCardExpiration,
            0x1e => RecordType::CreditCardVerificationValue,
            0x1f => RecordType::CreditCardPin,
            0x20 => RecordType::QRCode,
            END_OF_ENTRY => RecordType::EndOfEntry,
            other => RecordType::Unknown(other),
        }
    }

    fn data_type(self) -> DataType {
        match self {
            RecordType::Uuid => DataType::Uuid,
            RecordType::CreationTime
            | RecordType::PasswordModificationTime
            | RecordType::LastAccessTime
            | RecordType::PasswordExpiryTime
            | RecordType::LastModificationTime => DataType::Time,
            RecordType::TwoFactorKey => DataType::Binary,
            RecordType::PasswordExpiryInterval
            | RecordType::DoubleClickAction
            | RecordType::ProtectedEntry
            | RecordType::ShiftDoubleClickAction
            | RecordType::EntryKeyboardShortcut
            | RecordType::EndOfEntry
            | RecordType::Unknown(_) => DataType::Unknown,
            _ => DataType::Text,
        }
    }
}

impl PartialOrd for RecordType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.code().cmp(&other.code())
    }
}

/// Empty record of `kind`, or the default sequence for Autotype.
fn blank(kind: RecordType) -> Result<Record> {
    match kind {
        RecordType::Autotype => Record::with_text(kind, DEFAULT_AUTOTYPE),
        _ => Record::new(kind),
    }
}

// ---------------------------------------------------------------------------
// RecordCollection
// ---------------------------------------------------------------------------

/// Ordered records of one entry.
#[derive(Debug, Default)]
pub struct RecordCollection {
    items: Vec<Record>,
    state: Option<Rc<DocumentState>>,
}

/// Copies every record into a new, detached collection.
impl Clone for RecordCollection {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            state: None,
        }
    }
}

impl RecordCollection {
    /// An empty, detached collection.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_fields(items: Vec<Record>) -> Self {
        Self { items, state: None }
    }

    pub(crate) fn attach(&mut self, state: Rc<DocumentState>) {
        self.state = Some(state);
    }

    pub(crate) fn detach(&mut self) {
        self.state = None;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.items.iter()
    }

    /// Record at `index`. Reading through this reference is not tracked.
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.items.get(index)
    }

    pub fn contains(&self, kind: RecordType) -> bool {
        self.find(kind).is_some()
    }

    /// First record of `kind`, without creating one or tracking access.
    pub fn find(&self, kind: RecordType) -> Option<&Record> {
        self.items.iter().find(|r| r.kind().code() == kind.code())
    }

    /// True only when attached to a read-only document.
    pub fn is_read_only(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.is_read_only())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(PwVaultError::ReadOnly);
        }
        Ok(())
    }

    pub fn add(&mut self, record: Record) -> Result<()> {
        self.ensure_writable()?;
        let kind = record.kind();
        self.items.push(record);
        self.mark_changed(Some(kind))
    }

    pub fn insert(&mut self, index: usize, record: Record) -> Result<()> {
        self.ensure_writable()?;
        if index > self.items.len() {
            return Err(PwVaultError::InvalidArgument(format!(
                "index {index} is past the end of the records"
            )));
        }
        let kind = record.kind();
        self.items.insert(index, record);
        self.mark_changed(Some(kind))
    }

    /// Replace the record at `index`, returning the old one.
    pub fn replace(&mut self, index: usize, record: Record) -> Result<Record> {
        self.ensure_writable()?;
        if index >= self.items.len() {
            return Err(PwVaultError::InvalidArgument(format!(
                "no record at index {index}"
            )));
        }
        let kind = record.kind();
        let old = std::mem::replace(&mut self.items[index], record);
        self.mark_changed(Some(kind))?;
        Ok(old)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Record> {
        self.ensure_writable()?;
        if index >= self.items.len() {
            return Err(PwVaultError::InvalidArgument(format!(
                "no record at index {index}"
            )));
        }
        let record = self.items.remove(index);
        self.mark_changed(Some(record.kind()))?;
        Ok(record)
    }

    /// Remove the first record of `kind`, if any.
    pub fn remove(&mut self, kind: RecordType) -> Result<Option<Record>> {
        self.ensure_writable()?;
        match self.items.iter().position(|r| r.kind().code() == kind.code()) {
            Some(index) => self.remove_at(index).map(Some),
            None => Ok(None),
        }
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.items.clear();
        self.mark_changed(None)
    }

    /// Handle to the first record of `kind`.
    ///
    /// A missing record is created in code order without marking the
    /// document changed. On a read-only document the handle wraps a
    /// detached empty record instead.
    pub fn field(&mut self, kind: RecordType) -> Result<RecordRef<'_>> {
        if !self.contains(kind) {
            if self.is_read_only() {
                return Ok(RecordRef {
                    slot: Slot::Detached(blank(kind)?),
                });
            }
            self.insert_blank(kind)?;
        }
        Ok(RecordRef {
            slot: Slot::Attached {
                records: self,
                kind,
                nth: 0,
            },
        })
    }

    /// Handle to the record at `index`.
    pub fn at(&mut self, index: usize) -> Option<RecordRef<'_>> {
        let kind = self.items.get(index)?.kind();
        let nth = occurrence_of(&self.items, index);
        Some(RecordRef {
            slot: Slot::Attached {
                records: self,
                kind,
                nth,
            },
        })
    }

    fn insert_blank(&mut self, kind: RecordType) -> Result<()> {
        let index = insertion_slot(&self.items, kind);
        self.items.insert(index, blank(kind)?);
        Ok(())
    }

    /// Write the first record of `kind`, creating it when missing.
    pub(crate) fn put(&mut self, kind: RecordType, value: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        if !self.contains(kind) {
            self.insert_blank(kind)?;
        }
        self.store(kind, 0, value)
    }

    fn store(&mut self, kind: RecordType, nth: usize, value: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let index = position_of(&self.items, kind, nth).ok_or_else(|| {
            PwVaultError::InvalidArgument(format!("{kind:?} record no longer exists"))
        })?;
        if self.items[index].bytes()?.as_slice() == value {
            return Ok(());
        }

        if kind == RecordType::Password && self.contains(RecordType::PasswordHistory) {
            self.keep_outgoing_password(index)?;
        }

        // History capture may have inserted records ahead of this one.
        let index = position_of(&self.items, kind, nth).ok_or_else(|| {
            PwVaultError::InvalidArgument(format!("{kind:?} record no longer exists"))
        })?;
        if self.items[index].replace(value)? {
            self.mark_changed(Some(kind))?;
        }
        Ok(())
    }

    fn keep_outgoing_password(&mut self, index: usize) -> Result<()> {
        let outgoing = Zeroizing::new(self.items[index].text()?);
        let time = self
            .find(RecordType::PasswordModificationTime)
            .and_then(|r| r.time().ok().flatten())
            .unwrap_or_else(now);

        let mut history = PasswordHistory::new(self)?;
        if history.is_enabled() {
            history.add(time, &outgoing)?;
        }
        Ok(())
    }

    /// Set a tracking timestamp without re-entering the change hook.
    fn stamp(&mut self, kind: RecordType, time: DateTime<Utc>) -> Result<()> {
        if !self.contains(kind) {
            self.insert_blank(kind)?;
        }
        let bytes = encode_time(kind, time)?;
        let index = position_of(&self.items, kind, 0).ok_or_else(|| {
            PwVaultError::InvalidArgument(format!("{kind:?} record no longer exists"))
        })?;
        if self.items[index].replace(&bytes)? {
            if let Some(state) = &self.state {
                state.mark_changed();
            }
        }
        Ok(())
    }

    /// Change hook. `None` stands for bulk operations.
    pub(crate) fn mark_changed(&mut self, kind: Option<RecordType>) -> Result<()> {
        let Some(state) = self.state.clone() else {
            return Ok(());
        };
        state.mark_changed();

        if self.items.is_empty() || state.is_read_only() || !state.tracks_modify() {
            return Ok(());
        }
        if kind.is_some_and(RecordType::is_tracking_timestamp) {
            return Ok(());
        }

        let time = now();
        if self.contains(RecordType::CreationTime) {
            self.stamp(RecordType::LastModificationTime, time)?;
        } else {
            self.stamp(RecordType::CreationTime, time)?;
        }
        if kind == Some(RecordType::Password) {
            self.stamp(RecordType::PasswordModificationTime, time)?;
        }
        Ok(())
    }

    /// Access hook for reads through a handle.
    pub(crate) fn mark_accessed(&mut self, kind: RecordType) -> Result<()> {
        let Some(state) = self.state.clone() else {
            return Ok(());
        };
        if state.is_read_only() || !state.tracks_access() {
            return Ok(());
        }
        match kind {
            RecordType::Uuid | RecordType::Group | RecordType::Title => Ok(()),
            k if k.is_tracking_timestamp() => Ok(()),
            _ => self.stamp(RecordType::LastAccessTime, now()),
        }
    }

    pub(crate) fn fields(&self) -> &[Record] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a RecordCollection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// RecordRef
// ---------------------------------------------------------------------------

enum Slot<'a> {
    Attached {
        records: &'a mut RecordCollection,
        kind: RecordType,
        nth: usize,
    },
    Detached(Record),
}

/// Read/write handle to one record, as returned by
/// `RecordCollection::field`. Reads go through the access hook.
pub struct RecordRef<'a> {
    slot: Slot<'a>,
}

impl RecordRef<'_> {
    pub fn kind(&self) -> RecordType {
        match &self.slot {
            Slot::Attached { kind, .. } => *kind,
            Slot::Detached(record) => record.kind(),
        }
    }

    fn read<T>(&mut self, read: impl FnOnce(&Record) -> Result<T>) -> Result<T> {
        match &mut self.slot {
            Slot::Attached { records, kind, nth } => {
                let index = position_of(&records.items, *kind, *nth).ok_or_else(|| {
                    PwVaultError::InvalidArgument(format!("{kind:?} record no longer exists"))
                })?;
                let value = read(&records.items[index])?;
                records.mark_accessed(*kind)?;
                Ok(value)
            }
            Slot::Detached(record) => read(record),
        }
    }

    fn write(&mut self, value: &[u8]) -> Result<()> {
        match &mut self.slot {
            Slot::Attached { records, kind, nth } => records.store(*kind, *nth, value),
            Slot::Detached(_) => Err(PwVaultError::ReadOnly),
        }
    }

    pub fn bytes(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        self.read(|r| r.bytes())
    }

    pub fn text(&mut self) -> Result<String> {
        self.read(|r| r.text())
    }

    pub fn time(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.read(|r| r.time())
    }

    pub fn uuid(&mut self) -> Result<Option<Uuid>> {
        self.read(|r| r.uuid())
    }

    pub fn set_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write(value)
    }

    /// Setting a different Password while history is enabled first moves
    /// the outgoing password into the history.
    pub fn set_text(&mut self, value: &str) -> Result<()> {
        let bytes = Zeroizing::new(encode_text(self.kind(), value)?);
        self.write(&bytes)
    }

    pub fn set_time(&mut self, value: DateTime<Utc>) -> Result<()> {
        let bytes = encode_time(self.kind(), value)?;
        self.write(&bytes)
    }

    pub fn set_uuid(&mut self, value: Uuid) -> Result<()> {
        let bytes = encode_uuid(self.kind(), value)?;
        self.write(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached(fields: Vec<Record>) -> (Rc<DocumentState>, RecordCollection) {
        let state = DocumentState::new();
        let mut records = RecordCollection::from_fields(fields);
        records.attach(state.clone());
        (state, records)
    }

    fn title(text: &str) -> Record {
        Record::with_text(RecordType::Title, text).unwrap()
    }

    #[test]
    fn codes_roundtrip_including_unknown() {
        for code in 0u8..=0xFF {
            assert_eq!(RecordType::from_code(code).code(), code);
        }
        assert_eq!(RecordType::from_code(0x0b), RecordType::Unknown(0x0b));
        assert_eq!(RecordType::ProtectedEntry.data_type(), DataType::Unknown);
        assert_eq!(RecordType::TwoFactorKey.data_type(), DataType::Binary);
        assert_eq!(RecordType::QRCode.data_type(), DataType::Text);
    }

    #[test]
    fn detached_collection_tracks_nothing() {
        let mut records = RecordCollection::new();
        records.add(title("x")).unwrap();
        records.field(RecordType::Notes).unwrap().set_text("n").unwrap();
        assert!(!records.contains(RecordType::CreationTime));
        assert!(!records.contains(RecordType::LastAccessTime));
        assert!(!records.is_read_only());
    }

    #[test]
    fn first_change_stamps_creation_time() {
        let (state, mut records) = attached(vec![title("x")]);
        records.field(RecordType::UserName).unwrap().set_text("alice").unwrap();
        assert!(state.has_changed());
        assert!(records.contains(RecordType::CreationTime));
        assert!(!records.contains(RecordType::LastModificationTime));
    }

    #[test]
    fn later_change_stamps_modification_time() {
        let created = Record::with_time(
            RecordType::CreationTime,
            DateTime::from_timestamp(1_000, 0).unwrap(),
        )
        .unwrap();
        let (_, mut records) = attached(vec![title("x"), created]);
        records.field(RecordType::UserName).unwrap().set_text("alice").unwrap();

        assert!(records.contains(RecordType::LastModificationTime));
        assert_eq!(
            records
                .find(RecordType::CreationTime)
                .unwrap()
                .time()
                .unwrap()
                .unwrap()
                .timestamp(),
            1_000
        );
    }

    #[test]
    fn password_change_stamps_password_time() {
        let (_, mut records) = attached(vec![title("x")]);
        records.field(RecordType::Password).unwrap().set_text("pw").unwrap();
        assert!(records.contains(RecordType::PasswordModificationTime));
    }

    #[test]
    fn tracking_timestamps_do_not_trigger_tracking() {
        let (state, mut records) = attached(vec![title("x")]);
        records
            .field(RecordType::LastAccessTime)
            .unwrap()
            .set_time(DateTime::from_timestamp(5, 0).unwrap())
            .unwrap();
        assert!(state.has_changed());
        assert!(!records.contains(RecordType::CreationTime));
    }

    #[test]
    fn modify_tracking_can_be_disabled() {
        let (state, mut records) = attached(vec![title("x")]);
        state.set_track_modify(false);
        records.field(RecordType::UserName).unwrap().set_text("a").unwrap();
        assert!(state.has_changed());
        assert!(!records.contains(RecordType::CreationTime));
    }

    #[test]
    fn same_value_is_not_a_change() {
        let (state, mut records) = attached(vec![title("x")]);
        records.field(RecordType::Title).unwrap().set_text("x").unwrap();
        assert!(!state.has_changed());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn auto_created_record_is_silent() {
        let (state, mut records) = attached(vec![title("x")]);
        let _ = records.field(RecordType::Url).unwrap();
        assert!(!state.has_changed());
        assert_eq!(records.get(1).unwrap().kind(), RecordType::Url);
    }

    #[test]
    fn auto_created_autotype_has_default_sequence() {
        let (_, mut records) = attached(vec![]);
        let _ = records.field(RecordType::Autotype).unwrap();
        assert_eq!(
            records.find(RecordType::Autotype).unwrap().text().unwrap(),
            DEFAULT_AUTOTYPE
        );
    }

    #[test]
    fn reading_secret_fields_stamps_access_time() {
        let password = Record::with_text(RecordType::Password, "pw").unwrap();
        let (state, mut records) = attached(vec![title("x"), password]);

        assert_eq!(records.field(RecordType::Title).unwrap().text().unwrap(), "x");
        assert!(!records.contains(RecordType::LastAccessTime));
        assert!(!state.has_changed());

        assert_eq!(records.field(RecordType::Password).unwrap().text().unwrap(), "pw");
        assert!(records.contains(RecordType::LastAccessTime));
        assert!(state.has_changed());
    }

    #[test]
    fn access_tracking_can_be_disabled() {
        let password = Record::with_text(RecordType::Password, "pw").unwrap();
        let (state, mut records) = attached(vec![password]);
        state.set_track_access(false);
        records.field(RecordType::Password).unwrap().text().unwrap();
        assert!(!records.contains(RecordType::LastAccessTime));
    }

    #[test]
    fn read_only_rejects_writes_and_does_not_track() {
        let password = Record::with_text(RecordType::Password, "pw").unwrap();
        let (state, mut records) = attached(vec![title("x"), password]);
        state.set_read_only(true);

        assert_eq!(records.field(RecordType::Password).unwrap().text().unwrap(), "pw");
        assert_eq!(records.field(RecordType::Url).unwrap().text().unwrap(), "");
        assert_eq!(records.len(), 2);

        assert!(matches!(
            records.field(RecordType::Title).unwrap().set_text("y"),
            Err(PwVaultError::ReadOnly)
        ));
        assert!(matches!(records.clear(), Err(PwVaultError::ReadOnly)));
        assert!(matches!(records.remove_at(0), Err(PwVaultError::ReadOnly)));
        assert!(!state.has_changed());
    }

    #[test]
    fn removal_marks_changed() {
        let (state, mut records) = attached(vec![title("x"), title("y")]);
        let removed = records.remove(RecordType::Title).unwrap().unwrap();
        assert_eq!(removed.text().unwrap(), "x");
        assert!(state.has_changed());
    }

    #[test]
    fn clear_on_empty_collection_only_marks_dirty() {
        let (state, mut records) = attached(vec![title("x")]);
        records.clear().unwrap();
        assert!(records.is_empty());
        assert!(state.has_changed());
    }

    #[test]
    fn clone_is_detached() {
        let (_, records) = attached(vec![title("x")]);
        let mut copy = records.clone();
        copy.field(RecordType::Notes).unwrap().set_text("n").unwrap();
        assert!(!copy.contains(RecordType::CreationTime));
        assert!(!records.contains(RecordType::Notes));
    }
}
