//! The vault document: headers, entries, passphrase and load/save.
//!
//! `Document` is the entry point of the library. Create one with
//! `Document::new`, or read one with `Document::load` / `Document::open`,
//! then work through `headers_mut()` and `entries_mut()`. Every change
//! sets `has_changed()` until the next successful save.
//!
//! The document, its header collection and every attached entry share
//! one `DocumentState`. That sharing is single-threaded (`Rc`/`Cell`),
//! which keeps `Document` off other threads.

use std::cell::Cell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::entry::{Entry, EntryCollection};
use super::field::now;
use super::format::{self, KeySource};
use super::header::{Header, HeaderCollection, HeaderType, DEFAULT_VERSION};
use super::policy::{decode_named, NamedPasswordPolicies, NamedPasswordPolicy};
use super::record::Record;
use crate::crypto::kdf::MIN_ITERATIONS;
use crate::crypto::keys::KEY_LEN;
use crate::crypto::{DataKeys, SecretBox};
use crate::errors::{PwVaultError, Result};

// ---------------------------------------------------------------------------
// DocumentState
// ---------------------------------------------------------------------------

/// Flags shared by a document and everything attached to it.
#[derive(Debug)]
pub(crate) struct DocumentState {
    read_only: Cell<bool>,
    track_access: Cell<bool>,
    track_modify: Cell<bool>,
    changed: Cell<bool>,
}

impl DocumentState {
    /// Writable, unchanged, with both kinds of tracking on.
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            read_only: Cell::new(false),
            track_access: Cell::new(true),
            track_modify: Cell::new(true),
            changed: Cell::new(false),
        })
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only.get()
    }

    pub(crate) fn set_read_only(&self, value: bool) {
        self.read_only.set(value);
    }

    pub(crate) fn tracks_access(&self) -> bool {
        self.track_access.get()
    }

    pub(crate) fn set_track_access(&self, value: bool) {
        self.track_access.set(value);
    }

    pub(crate) fn tracks_modify(&self) -> bool {
        self.track_modify.get()
    }

    pub(crate) fn set_track_modify(&self, value: bool) {
        self.track_modify.set(value);
    }

    pub(crate) fn mark_changed(&self) {
        self.changed.set(true);
    }

    pub(crate) fn clear_changed(&self) {
        self.changed.set(false);
    }

    pub(crate) fn has_changed(&self) -> bool {
        self.changed.get()
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An open Password Safe v3 vault.
pub struct Document {
    state: Rc<DocumentState>,
    headers: HeaderCollection,
    entries: EntryCollection,
    passphrase: Option<SecretBox>,
    iterations: u32,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("state", &self.state)
            .field("headers", &self.headers.len())
            .field("entries", &self.entries.len())
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl Document {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// An empty document with a Version and a fresh random Uuid header.
    pub fn new(passphrase: &str) -> Result<Self> {
        let headers = vec![
            Header::with_version(HeaderType::Version, DEFAULT_VERSION)?,
            Header::with_uuid(HeaderType::Uuid, Uuid::new_v4())?,
        ];
        Self::from_parts(
            Some(SecretBox::seal(passphrase.as_bytes())?),
            MIN_ITERATIONS,
            headers,
            Vec::new(),
        )
    }

    fn from_parts(
        passphrase: Option<SecretBox>,
        iterations: u32,
        headers: Vec<Header>,
        entries: Vec<Vec<Record>>,
    ) -> Result<Self> {
        let state = DocumentState::new();
        let headers = HeaderCollection::from_fields(state.clone(), headers)?;
        let entries = EntryCollection::from_entries(
            state.clone(),
            entries.into_iter().map(Entry::from_records).collect(),
        );
        Ok(Self {
            state,
            headers,
            entries,
            passphrase,
            iterations,
        })
    }

    /// Decrypt a vault image.
    ///
    /// A wrong passphrase and a damaged file give the same
    /// `UnrecognizedFormat` error. The stored iteration count is kept
    /// as is, even when it is below the minimum used for saving.
    pub fn load(data: &[u8], passphrase: &str) -> Result<Self> {
        let raw = format::decode(data, KeySource::Passphrase(passphrase.as_bytes()))?;
        Self::from_parts(
            Some(SecretBox::seal(passphrase.as_bytes())?),
            raw.iterations,
            raw.headers,
            raw.entries,
        )
    }

    /// Decrypt a vault image with known data keys (`K || L`).
    ///
    /// The passphrase is neither checked nor known afterwards, so the
    /// document can only be saved through `to_bytes_with` or after
    /// `change_passphrase`.
    pub fn load_with_keys(data: &[u8], keys: &[u8; 2 * KEY_LEN]) -> Result<Self> {
        let keys = DataKeys::from_concatenated(keys);
        let raw = format::decode(data, KeySource::Keys(&keys))?;
        Self::from_parts(None, raw.iterations, raw.headers, raw.entries)
    }

    /// Read and decrypt the vault file at `path`.
    pub fn open(path: &Path, passphrase: &str) -> Result<Self> {
        let data = format::read_file(path)?;
        let document = Self::load(&data, passphrase)?;
        tracing::debug!(path = %path.display(), entries = document.entries.len(), "opened vault");
        Ok(document)
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Encrypt and write the document to `path` atomically, using the
    /// current passphrase.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let passphrase = self.current_passphrase()?;
        let bytes = self.encode(&passphrase, &DataKeys::generate())?;
        format::write_file(path, &bytes)?;
        self.state.clear_changed();
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved vault");
        Ok(())
    }

    /// Encrypt the document with the current passphrase.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let passphrase = self.current_passphrase()?;
        self.finish_encode(&passphrase, &DataKeys::generate())
    }

    /// Encrypt the document with `passphrase`, which is not remembered.
    pub fn to_bytes_with(&mut self, passphrase: &str) -> Result<Vec<u8>> {
        self.finish_encode(passphrase.as_bytes(), &DataKeys::generate())
    }

    /// Encrypt with `passphrase` and the given data keys (`K || L`).
    pub fn to_bytes_with_keys(
        &mut self,
        passphrase: &str,
        keys: &[u8; 2 * KEY_LEN],
    ) -> Result<Vec<u8>> {
        self.finish_encode(passphrase.as_bytes(), &DataKeys::from_concatenated(keys))
    }

    fn current_passphrase(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.passphrase
            .as_ref()
            .ok_or(PwVaultError::MissingPassphrase)?
            .open()
    }

    fn finish_encode(&mut self, passphrase: &[u8], keys: &DataKeys) -> Result<Vec<u8>> {
        let bytes = self.encode(passphrase, keys)?;
        self.state.clear_changed();
        Ok(bytes)
    }

    fn encode(&mut self, passphrase: &[u8], keys: &DataKeys) -> Result<Vec<u8>> {
        if !self.is_read_only() && self.tracks_modify() {
            self.stamp_save()?;
        }
        let entries: Vec<&[Record]> = self
            .entries
            .iter()
            .map(|e| e.records().fields())
            .collect();
        format::encode(
            self.headers.fields(),
            &entries,
            passphrase,
            self.iterations,
            keys,
        )
    }

    fn stamp_save(&mut self) -> Result<()> {
        self.headers
            .field(HeaderType::TimestampOfLastSave)?
            .set_time(now())?;
        self.headers
            .field(HeaderType::WhatPerformedLastSave)?
            .set_text(&application_stamp())?;
        self.headers
            .field(HeaderType::LastSavedByUser)?
            .set_text(&current_user())?;
        self.headers
            .field(HeaderType::LastSavedOnHost)?
            .set_text(&current_host())?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    pub fn headers(&self) -> &HeaderCollection {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderCollection {
        &mut self.headers
    }

    pub fn entries(&self) -> &EntryCollection {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut EntryCollection {
        &mut self.entries
    }

    /// Named password policies, decoded from their header.
    pub fn named_policies(&self) -> Vec<NamedPasswordPolicy> {
        let text = self
            .headers
            .find(HeaderType::NamedPasswordPolicies)
            .and_then(|h| h.text().ok())
            .unwrap_or_default();
        decode_named(&text)
    }

    /// Editable view of the named policies. Each edit rewrites the header.
    pub fn named_policies_mut(&mut self) -> Result<NamedPasswordPolicies<'_>> {
        NamedPasswordPolicies::new(&mut self.headers)
    }

    // ------------------------------------------------------------------
    // Header shortcuts
    // ------------------------------------------------------------------

    fn header_text(&self, kind: HeaderType) -> String {
        self.headers
            .find(kind)
            .and_then(|h| h.text().ok())
            .unwrap_or_default()
    }

    pub fn version(&self) -> u16 {
        self.headers
            .find(HeaderType::Version)
            .and_then(|h| h.version().ok().flatten())
            .unwrap_or_default()
    }

    pub fn set_version(&mut self, version: u16) -> Result<()> {
        self.headers.field(HeaderType::Version)?.set_version(version)
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.headers
            .find(HeaderType::Uuid)
            .and_then(|h| h.uuid().ok().flatten())
    }

    pub fn set_uuid(&mut self, uuid: Uuid) -> Result<()> {
        self.headers.field(HeaderType::Uuid)?.set_uuid(uuid)
    }

    pub fn name(&self) -> String {
        self.header_text(HeaderType::DatabaseName)
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.headers.field(HeaderType::DatabaseName)?.set_text(name)
    }

    pub fn description(&self) -> String {
        self.header_text(HeaderType::DatabaseDescription)
    }

    pub fn set_description(&mut self, description: &str) -> Result<()> {
        self.headers
            .field(HeaderType::DatabaseDescription)?
            .set_text(description)
    }

    pub fn last_save_time(&self) -> Option<DateTime<Utc>> {
        self.headers
            .find(HeaderType::TimestampOfLastSave)
            .and_then(|h| h.time().ok().flatten())
    }

    pub fn last_save_application(&self) -> String {
        self.header_text(HeaderType::WhatPerformedLastSave)
    }

    pub fn last_save_user(&self) -> String {
        self.header_text(HeaderType::LastSavedByUser)
    }

    pub fn last_save_host(&self) -> String {
        self.header_text(HeaderType::LastSavedOnHost)
    }

    // ------------------------------------------------------------------
    // Settings and flags
    // ------------------------------------------------------------------

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Set the stretch iteration count, raised to at least 2048.
    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations.max(MIN_ITERATIONS);
    }

    pub fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.state.set_read_only(read_only);
    }

    pub fn tracks_access(&self) -> bool {
        self.state.tracks_access()
    }

    pub fn set_track_access(&mut self, track: bool) {
        self.state.set_track_access(track);
    }

    pub fn tracks_modify(&self) -> bool {
        self.state.tracks_modify()
    }

    pub fn set_track_modify(&mut self, track: bool) {
        self.state.set_track_modify(track);
    }

    pub fn has_changed(&self) -> bool {
        self.state.has_changed()
    }

    // ------------------------------------------------------------------
    // Passphrase
    // ------------------------------------------------------------------

    pub fn has_passphrase(&self) -> bool {
        self.passphrase.is_some()
    }

    /// Replace the passphrase used by the next save.
    pub fn change_passphrase(&mut self, passphrase: &str) -> Result<()> {
        match &mut self.passphrase {
            Some(secret) => secret.reseal(passphrase.as_bytes())?,
            None => self.passphrase = Some(SecretBox::seal(passphrase.as_bytes())?),
        }
        self.state.mark_changed();
        Ok(())
    }

    /// Change the passphrase only if `old` matches. Returns whether it did.
    pub fn try_change_passphrase(&mut self, old: &str, new: &str) -> Result<bool> {
        if !self.validate_passphrase(old)? {
            return Ok(false);
        }
        self.change_passphrase(new)?;
        Ok(true)
    }

    /// Whether `passphrase` is the current one. A document without a
    /// known passphrase accepts anything.
    pub fn validate_passphrase(&self, passphrase: &str) -> Result<bool> {
        match &self.passphrase {
            Some(secret) => secret.matches(passphrase.as_bytes()),
            None => Ok(true),
        }
    }
}

/// `pwvault V<major>.<minor>`, with the minor version in two digits.
fn application_stamp() -> String {
    let major: u32 = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or_default();
    let minor: u32 = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or_default();
    format!("pwvault V{major}.{minor:02}")
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}

fn current_host() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_default()
}
