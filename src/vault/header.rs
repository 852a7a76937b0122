//! Vault headers: document-level metadata fields.
//!
//! The header collection always starts with exactly one `Version` field.
//! Everything else is free-form and kept in file order, including types
//! this crate does not know about.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::document::DocumentState;
use super::field::{
    encode_text, encode_time, encode_uuid, encode_version, insertion_slot, occurrence_of,
    position_of, DataType, Field, FieldKind, END_OF_ENTRY,
};
use crate::errors::{PwVaultError, Result};

/// Format version written into new vaults (3.13).
pub const DEFAULT_VERSION: u16 = 0x030D;

/// A header field.
pub type Header = Field<HeaderType>;

// ---------------------------------------------------------------------------
// HeaderType
// ---------------------------------------------------------------------------

/// Header type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderType {
    Version,
    Uuid,
    NonDefaultPreferences,
    TreeDisplayStatus,
    TimestampOfLastSave,
    WhoPerformedLastSave,
    WhatPerformedLastSave,
    LastSavedByUser,
    LastSavedOnHost,
    DatabaseName,
    DatabaseDescription,
    DatabaseFilters,
    RecentlyUsedEntries,
    NamedPasswordPolicies,
    EmptyGroups,
    Yubico,
    EndOfEntry,
    Unknown(u8),
}

impl FieldKind for HeaderType {
    fn code(self) -> u8 {
        match self {
            HeaderType::Version => 0x00,
            HeaderType::Uuid => 0x01,
            HeaderType::NonDefaultPreferences => 0x02,
            HeaderType::TreeDisplayStatus => 0x03,
            HeaderType::TimestampOfLastSave => 0x04,
            HeaderType::WhoPerformedLastSave => 0x05,
            HeaderType::WhatPerformedLastSave => 0x06,
            HeaderType::LastSavedByUser => 0x07,
            HeaderType::LastSavedOnHost => 0x08,
            HeaderType::DatabaseName => 0x09,
            HeaderType::DatabaseDescription => 0x0a,
            HeaderType::DatabaseFilters => 0x0b,
            HeaderType::RecentlyUsedEntries => 0x0f,
            HeaderType::NamedPasswordPolicies => 0x10,
            HeaderType::EmptyGroups => 0x11,
            HeaderType::Yubico => 0x12,
            HeaderType::EndOfEntry => END_OF_ENTRY,
            HeaderType::Unknown(code) => code,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            0x00 => HeaderType::Version,
            0x01 => HeaderType::Uuid,
            0x02 => HeaderType::NonDefaultPreferences,
            0x03 => HeaderType::TreeDisplayStatus,
            0x04 => HeaderType::TimestampOfLastSave,
            0x05 => HeaderType::WhoPerformedLastSave,
            0x06 => HeaderType::WhatPerformedLastSave,
            0x07 => HeaderType::LastSavedByUser,
            0x08 => HeaderType::LastSavedOnHost,
            0x09 => HeaderType::DatabaseName,
            0x0a => HeaderType::DatabaseDescription,
            0x0b => HeaderType::DatabaseFilters,
            0x0f => HeaderType::RecentlyUsedEntries,
            0x10 => HeaderType::NamedPasswordPolicies,
            0x11 => HeaderType::EmptyGroups,
            0x12 => HeaderType::Yubico,
            END_OF_ENTRY => HeaderType::EndOfEntry,
            other => HeaderType::Unknown(other),
        }
    }

    fn data_type(self) -> DataType {
        match self {
            HeaderType::Version => DataType::Version,
            HeaderType::Uuid => DataType::Uuid,
            HeaderType::TimestampOfLastSave => DataType::Time,
            HeaderType::EndOfEntry | HeaderType::Unknown(_) => DataType::Unknown,
            _ => DataType::Text,
        }
    }
}

impl PartialOrd for HeaderType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeaderType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.code().cmp(&other.code())
    }
}

// ---------------------------------------------------------------------------
// HeaderCollection
// ---------------------------------------------------------------------------

/// Ordered header fields of one document. Index 0 is always `Version`.
#[derive(Debug)]
pub struct HeaderCollection {
    items: Vec<Header>,
    state: Rc<DocumentState>,
}

impl HeaderCollection {
    /// Take ownership of loaded (or default) headers, moving the first
    /// `Version` to the front or inserting one.
    pub(crate) fn from_fields(state: Rc<DocumentState>, mut items: Vec<Header>) -> Result<Self> {
        match items.iter().position(|h| h.kind() == HeaderType::Version) {
            Some(0) => {}
            Some(index) => {
                let version = items.remove(index);
                items.insert(0, version);
            }
            None => {
                items.insert(0, Header::with_version(HeaderType::Version, DEFAULT_VERSION)?);
            }
        }
        Ok(Self { items, state })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Header> {
        self.items.get(index)
    }

    pub fn contains(&self, kind: HeaderType) -> bool {
        self.find(kind).is_some()
    }

    /// First header of `kind`, without creating one.
    pub fn find(&self, kind: HeaderType) -> Option<&Header> {
        self.items.iter().find(|h| h.kind().code() == kind.code())
    }

    pub fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(PwVaultError::ReadOnly);
        }
        Ok(())
    }

    pub fn add(&mut self, header: Header) -> Result<()> {
        self.ensure_writable()?;
        self.items.push(header);
        self.state.mark_changed();
        Ok(())
    }

    pub fn insert(&mut self, index: usize, header: Header) -> Result<()> {
        self.ensure_writable()?;
        if index > self.items.len() {
            return Err(PwVaultError::InvalidArgument(format!(
                "index {index} is past the end of the headers"
            )));
        }
        if index == 0 && header.kind() != HeaderType::Version {
            return Err(PwVaultError::InvalidArgument(
                "version must be the first header".into(),
            ));
        }
        self.items.insert(index, header);
        self.state.mark_changed();
        Ok(())
    }

    /// Replace the header at `index`, returning the old one.
    pub fn replace(&mut self, index: usize, header: Header) -> Result<Header> {
        self.ensure_writable()?;
        if index >= self.items.len() {
            return Err(PwVaultError::InvalidArgument(format!(
                "no header at index {index}"
            )));
        }
        if index == 0 && header.kind() != HeaderType::Version {
            return Err(PwVaultError::InvalidArgument(
                "version must be the first header".into(),
            ));
        }
        let old = std::mem::replace(&mut self.items[index], header);
        self.state.mark_changed();
        Ok(old)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Header> {
        self.ensure_writable()?;
        if index == 0 {
            return Err(PwVaultError::InvalidArgument(
                "cannot remove the version header".into(),
            ));
        }
        if index >= self.items.len() {
            return Err(PwVaultError::InvalidArgument(format!(
                "no header at index {index}"
            )));
        }
        let header = self.items.remove(index);
        self.state.mark_changed();
        Ok(header)
    }

    /// Remove the first header of `kind`, if any.
    pub fn remove(&mut self, kind: HeaderType) -> Result<Option<Header>> {
        self.ensure_writable()?;
        match self.items.iter().position(|h| h.kind().code() == kind.code()) {
            Some(index) => self.remove_at(index).map(Some),
            None => Ok(None),
        }
    }

    /// Remove every header except the version.
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.items.truncate(1);
        self.state.mark_changed();
        Ok(())
    }

    /// Handle to the first header of `kind`.
    ///
    /// A missing header is created in code order without marking the
    /// document changed. On a read-only document the handle wraps a
    /// detached empty header instead.
    pub fn field(&mut self, kind: HeaderType) -> Result<HeaderRef<'_>> {
        if !self.contains(kind) {
            if self.is_read_only() {
                return Ok(HeaderRef {
                    slot: Slot::Detached(Header::new(kind)?),
                });
            }
            let index = insertion_slot(&self.items, kind);
            self.items.insert(index, Header::new(kind)?);
        }
        Ok(HeaderRef {
            slot: Slot::Attached {
                headers: self,
                kind,
                nth: 0,
            },
        })
    }

    /// Handle to the header at `index`.
    pub fn at(&mut self, index: usize) -> Option<HeaderRef<'_>> {
        let header = self.items.get(index)?;
        let kind = header.kind();
        let nth = occurrence_of(&self.items, index);
        Some(HeaderRef {
            slot: Slot::Attached {
                headers: self,
                kind,
                nth,
            },
        })
    }

    fn store(&mut self, kind: HeaderType, nth: usize, value: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let index = position_of(&self.items, kind, nth).ok_or_else(|| {
            PwVaultError::InvalidArgument(format!("{kind:?} header no longer exists"))
        })?;
        if self.items[index].replace(value)? {
            self.state.mark_changed();
        }
        Ok(())
    }

    pub(crate) fn fields(&self) -> &[Header] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a HeaderCollection {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// HeaderRef
// ---------------------------------------------------------------------------

enum Slot<'a> {
    Attached {
        headers: &'a mut HeaderCollection,
        kind: HeaderType,
        nth: usize,
    },
    Detached(Header),
}

/// Read/write handle to one header, as returned by `HeaderCollection::field`.
pub struct HeaderRef<'a> {
    slot: Slot<'a>,
}

impl HeaderRef<'_> {
    pub fn kind(&self) -> HeaderType {
        match &self.slot {
            Slot::Attached { kind, .. } => *kind,
            Slot::Detached(header) => header.kind(),
        }
    }

    fn read<T>(&self, read: impl FnOnce(&Header) -> Result<T>) -> Result<T> {
        match &self.slot {
            Slot::Attached {
                headers, kind, nth, ..
            } => {
                let index = position_of(&headers.items, *kind, *nth).ok_or_else(|| {
                    PwVaultError::InvalidArgument(format!("{kind:?} header no longer exists"))
                })?;
                read(&headers.items[index])
            }
            Slot::Detached(header) => read(header),
        }
    }

    fn write(&mut self, value: &[u8]) -> Result<()> {
        match &mut self.slot {
            Slot::Attached { headers, kind, nth } => headers.store(*kind, *nth, value),
            Slot::Detached(_) => Err(PwVaultError::ReadOnly),
        }
    }

    pub fn bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.read(|h| h.bytes())
    }

    pub fn text(&self) -> Result<String> {
        self.read(|h| h.text())
    }

    pub fn time(&self) -> Result<Option<DateTime<Utc>>> {
        self.read(|h| h.time())
    }

    pub fn uuid(&self) -> Result<Option<Uuid>> {
        self.read(|h| h.uuid())
    }

    pub fn version(&self) -> Result<Option<u16>> {
        self.read(|h| h.version())
    }

    pub fn set_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write(value)
    }

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

    pub fn set_version(&mut self, value: u16) -> Result<()> {
        let bytes = encode_version(self.kind(), value)?;
        self.write(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(fields: Vec<Header>) -> (Rc<DocumentState>, HeaderCollection) {
        let state = DocumentState::new();
        let headers = HeaderCollection::from_fields(state.clone(), fields).unwrap();
        (state, headers)
    }

    #[test]
    fn codes_roundtrip_including_unknown() {
        for code in 0u8..=0xFF {
            assert_eq!(HeaderType::from_code(code).code(), code);
        }
        assert_eq!(HeaderType::from_code(0x0c), HeaderType::Unknown(0x0c));
        assert_eq!(HeaderType::Unknown(0x0c).data_type(), DataType::Unknown);
        assert_eq!(HeaderType::DatabaseName.data_type(), DataType::Text);
    }

    #[test]
    fn types_order_by_code() {
        assert!(HeaderType::Version < HeaderType::Uuid);
        assert!(HeaderType::DatabaseFilters < HeaderType::Unknown(0x0c));
        assert!(HeaderType::Unknown(0x0c) < HeaderType::RecentlyUsedEntries);
    }

    #[test]
    fn version_is_inserted_when_missing() {
        let (state, headers) = headers(vec![]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(0).unwrap().version().unwrap(), Some(DEFAULT_VERSION));
        assert!(!state.has_changed());
    }

    #[test]
    fn version_is_moved_to_front() {
        let name = Header::with_text(HeaderType::DatabaseName, "db").unwrap();
        let version = Header::with_version(HeaderType::Version, 0x0310).unwrap();
        let (_, headers) = headers(vec![name, version]);
        assert_eq!(headers.get(0).unwrap().kind(), HeaderType::Version);
        assert_eq!(headers.get(1).unwrap().kind(), HeaderType::DatabaseName);
    }

    #[test]
    fn version_pin_is_enforced() {
        let (_, mut headers) = headers(vec![]);
        let name = Header::with_text(HeaderType::DatabaseName, "x").unwrap();
        assert!(headers.insert(0, name).is_err());
        assert!(headers.remove_at(0).is_err());
        assert!(headers.remove(HeaderType::Version).is_err());
        assert!(headers
            .replace(0, Header::new(HeaderType::Uuid).unwrap())
            .is_err());
    }

    #[test]
    fn clear_keeps_version() {
        let (state, mut headers) = headers(vec![]);
        headers
            .add(Header::with_text(HeaderType::DatabaseName, "x").unwrap())
            .unwrap();
        headers.clear().unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(0).unwrap().kind(), HeaderType::Version);
        assert!(state.has_changed());
    }

    #[test]
    fn field_creates_missing_header_in_order_silently() {
        let (state, mut headers) = headers(vec![]);
        headers
            .add(Header::with_text(HeaderType::DatabaseDescription, "d").unwrap())
            .unwrap();
        state.clear_changed();

        let name = headers.field(HeaderType::DatabaseName).unwrap();
        assert_eq!(name.text().unwrap(), "");
        assert_eq!(headers.get(1).unwrap().kind(), HeaderType::DatabaseName);
        assert_eq!(headers.get(2).unwrap().kind(), HeaderType::DatabaseDescription);
        assert!(!state.has_changed());
    }

    #[test]
    fn writing_through_handle_marks_changed_only_on_difference() {
        let (state, mut headers) = headers(vec![]);
        headers
            .field(HeaderType::DatabaseName)
            .unwrap()
            .set_text("Vault")
            .unwrap();
        assert!(state.has_changed());
        assert_eq!(headers.find(HeaderType::DatabaseName).unwrap().text().unwrap(), "Vault");

        state.clear_changed();
        headers
            .field(HeaderType::DatabaseName)
            .unwrap()
            .set_text("Vault")
            .unwrap();
        assert!(!state.has_changed());
    }

    #[test]
    fn read_only_returns_detached_dummy() {
        let (state, mut headers) = headers(vec![]);
        state.set_read_only(true);

        let mut name = headers.field(HeaderType::DatabaseName).unwrap();
        assert_eq!(name.text().unwrap(), "");
        assert!(matches!(name.set_text("x"), Err(PwVaultError::ReadOnly)));
        assert_eq!(headers.len(), 1);

        assert!(matches!(
            headers.add(Header::new(HeaderType::Uuid).unwrap()),
            Err(PwVaultError::ReadOnly)
        ));
        assert!(matches!(
            headers.at(0).unwrap().set_version(0x0310),
            Err(PwVaultError::ReadOnly)
        ));
        assert!(!state.has_changed());
    }

    #[test]
    fn at_addresses_duplicates_by_occurrence() {
        let (_, mut headers) = headers(vec![]);
        headers
            .add(Header::with_text(HeaderType::EmptyGroups, "a").unwrap())
            .unwrap();
        headers
            .add(Header::with_text(HeaderType::EmptyGroups, "b").unwrap())
            .unwrap();

        headers.at(2).unwrap().set_text("B").unwrap();
        assert_eq!(headers.get(1).unwrap().text().unwrap(), "a");
        assert_eq!(headers.get(2).unwrap().text().unwrap(), "B");
        assert!(headers.at(3).is_none());
    }

    #[test]
    fn remove_by_type_takes_first_match() {
        let (_, mut headers) = headers(vec![]);
        headers
            .add(Header::with_text(HeaderType::EmptyGroups, "a").unwrap())
            .unwrap();
        headers
            .add(Header::with_text(HeaderType::EmptyGroups, "b").unwrap())
            .unwrap();
        let removed = headers.remove(HeaderType::EmptyGroups).unwrap().unwrap();
        assert_eq!(removed.text().unwrap(), "a");
        assert!(headers.remove(HeaderType::Yubico).unwrap().is_none());
    }
}
