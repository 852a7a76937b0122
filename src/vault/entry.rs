//! Vault entries and the document's entry list.
//!
//! An `Entry` is a thin typed view over its `RecordCollection`: every
//! accessor goes through the collection's record handles, so change and
//! access tracking apply no matter which API a caller uses.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::autotype::{
    credit_card_digits, note_lines, text_to_keys, AutotypeCommand, AutotypeToken, AutotypeTokens,
};
use super::document::DocumentState;
use super::field::{DataType, FieldKind};
use super::group::GroupPath;
use super::history::PasswordHistory;
use super::policy::PasswordPolicy;
use super::record::{Record, RecordCollection, RecordType};
use crate::errors::{PwVaultError, Result};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One password entry.
#[derive(Debug, Clone)]
pub struct Entry {
    records: RecordCollection,
}

impl Entry {
    /// A new entry with a random UUID and empty Title and Password.
    pub fn new() -> Result<Self> {
        let records = RecordCollection::from_fields(vec![
            Record::with_uuid(RecordType::Uuid, Uuid::new_v4())?,
            Record::with_text(RecordType::Title, "")?,
            Record::with_text(RecordType::Password, "")?,
        ]);
        Ok(Self { records })
    }

    pub fn with_title(title: &str) -> Result<Self> {
        let mut entry = Self::new()?;
        entry.set_title(title)?;
        Ok(entry)
    }

    pub fn with_group(group: &GroupPath, title: &str) -> Result<Self> {
        let mut entry = Self::with_title(title)?;
        entry.set_group(group)?;
        Ok(entry)
    }

    pub(crate) fn from_records(records: Vec<Record>) -> Self {
        Self {
            records: RecordCollection::from_fields(records),
        }
    }

    pub fn records(&self) -> &RecordCollection {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut RecordCollection {
        &mut self.records
    }

    // -- untracked fields ---------------------------------------------------

    pub fn uuid(&self) -> Option<Uuid> {
        self.records
            .find(RecordType::Uuid)
            .and_then(|r| r.uuid().ok().flatten())
    }

    pub fn set_uuid(&mut self, uuid: Uuid) -> Result<()> {
        self.records.field(RecordType::Uuid)?.set_uuid(uuid)
    }

    pub fn title(&self) -> String {
        self.untracked_text(RecordType::Title)
    }

    pub fn set_title(&mut self, title: &str) -> Result<()> {
        self.set_text(RecordType::Title, title)
    }

    pub fn group(&self) -> GroupPath {
        GroupPath::from(self.untracked_text(RecordType::Group))
    }

    pub fn set_group(&mut self, group: &GroupPath) -> Result<()> {
        self.set_text(RecordType::Group, group.as_str())
    }

    fn untracked_text(&self, kind: RecordType) -> String {
        self.records
            .find(kind)
            .and_then(|r| r.text().ok())
            .unwrap_or_default()
    }

    // -- tracked text fields ------------------------------------------------

    /// Text of the first `kind` record, or empty when there is none.
    /// Reading an absent record is not an access. Fails with
    /// `FieldTypeMismatch` for time, uuid and binary record types.
    pub fn text(&mut self, kind: RecordType) -> Result<String> {
        kind.data_type().check(DataType::Text)?;
        if !self.records.contains(kind) {
            return Ok(String::new());
        }
        self.records.field(kind)?.text()
    }

    /// Text of a record type known to hold text.
    fn text_field(&mut self, kind: RecordType) -> String {
        self.text(kind).unwrap_or_default()
    }

    pub fn set_text(&mut self, kind: RecordType, value: &str) -> Result<()> {
        self.records.field(kind)?.set_text(value)
    }

    fn time(&mut self, kind: RecordType) -> Option<DateTime<Utc>> {
        if !self.records.contains(kind) {
            return None;
        }
        self.records
            .field(kind)
            .and_then(|mut r| r.time())
            .ok()
            .flatten()
    }

    fn set_time(&mut self, kind: RecordType, value: DateTime<Utc>) -> Result<()> {
        self.records.field(kind)?.set_time(value)
    }

    pub fn user_name(&mut self) -> String {
        self.text_field(RecordType::UserName)
    }

    pub fn set_user_name(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::UserName, value)
    }

    pub fn password(&mut self) -> Zeroizing<String> {
        Zeroizing::new(self.text_field(RecordType::Password))
    }

    /// Replace the password. With history enabled the outgoing password
    /// is kept in the history first.
    pub fn set_password(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::Password, value)
    }

    pub fn notes(&mut self) -> String {
        self.text_field(RecordType::Notes)
    }

    pub fn set_notes(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::Notes, value)
    }

    pub fn url(&mut self) -> String {
        self.text_field(RecordType::Url)
    }

    pub fn set_url(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::Url, value)
    }

    pub fn email(&mut self) -> String {
        self.text_field(RecordType::EmailAddress)
    }

    pub fn set_email(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::EmailAddress, value)
    }

    pub fn run_command(&mut self) -> String {
        self.text_field(RecordType::RunCommand)
    }

    pub fn set_run_command(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::RunCommand, value)
    }

    pub fn credit_card_number(&mut self) -> String {
        self.text_field(RecordType::CreditCardNumber)
    }

    pub fn set_credit_card_number(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::CreditCardNumber, value)
    }

    pub fn credit_card_expiration(&mut self) -> String {
        self.text_field(RecordType::CreditCardExpiration)
    }

    pub fn set_credit_card_expiration(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::CreditCardExpiration, value)
    }

    pub fn credit_card_verification_value(&mut self) -> String {
        self.text_field(RecordType::CreditCardVerificationValue)
    }

    pub fn set_credit_card_verification_value(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::CreditCardVerificationValue, value)
    }

    pub fn credit_card_pin(&mut self) -> String {
        self.text_field(RecordType::CreditCardPin)
    }

    pub fn set_credit_card_pin(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::CreditCardPin, value)
    }

    pub fn qr_code(&mut self) -> String {
        self.text_field(RecordType::QRCode)
    }

    pub fn set_qr_code(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::QRCode, value)
    }

    pub fn password_policy_name(&mut self) -> String {
        self.text_field(RecordType::PasswordPolicyName)
    }

    pub fn set_password_policy_name(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::PasswordPolicyName, value)
    }

    /// Raw autotype sequence; empty when the entry has none.
    pub fn autotype(&mut self) -> String {
        self.text_field(RecordType::Autotype)
    }

    pub fn set_autotype(&mut self, value: &str) -> Result<()> {
        self.set_text(RecordType::Autotype, value)
    }

    // -- binary and time fields ---------------------------------------------

    /// Raw two-factor key, empty when there is none.
    pub fn two_factor_key(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !self.records.contains(RecordType::TwoFactorKey) {
            return Ok(Zeroizing::new(Vec::new()));
        }
        self.records.field(RecordType::TwoFactorKey)?.bytes()
    }

    pub fn set_two_factor_key(&mut self, key: &[u8]) -> Result<()> {
        self.records.field(RecordType::TwoFactorKey)?.set_bytes(key)
    }

    pub fn creation_time(&mut self) -> Option<DateTime<Utc>> {
        self.time(RecordType::CreationTime)
    }

    pub fn set_creation_time(&mut self, value: DateTime<Utc>) -> Result<()> {
        self.set_time(RecordType::CreationTime, value)
    }

    pub fn password_modification_time(&mut self) -> Option<DateTime<Utc>> {
        self.time(RecordType::PasswordModificationTime)
    }

    pub fn set_password_modification_time(&mut self, value: DateTime<Utc>) -> Result<()> {
        self.set_time(RecordType::PasswordModificationTime, value)
    }

    pub fn last_access_time(&mut self) -> Option<DateTime<Utc>> {
        self.time(RecordType::LastAccessTime)
    }

    pub fn set_last_access_time(&mut self, value: DateTime<Utc>) -> Result<()> {
        self.set_time(RecordType::LastAccessTime, value)
    }

    pub fn password_expiry_time(&mut self) -> Option<DateTime<Utc>> {
        self.time(RecordType::PasswordExpiryTime)
    }

    pub fn set_password_expiry_time(&mut self, value: DateTime<Utc>) -> Result<()> {
        self.set_time(RecordType::PasswordExpiryTime, value)
    }

    pub fn last_modification_time(&mut self) -> Option<DateTime<Utc>> {
        self.time(RecordType::LastModificationTime)
    }

    pub fn set_last_modification_time(&mut self, value: DateTime<Utc>) -> Result<()> {
        self.set_time(RecordType::LastModificationTime, value)
    }

    // -- composite views ----------------------------------------------------

    /// Live view of the password history.
    pub fn password_history(&mut self) -> Result<PasswordHistory<'_>> {
        PasswordHistory::new(&mut self.records)
    }

    /// Policy from the PasswordPolicy and OwnSymbolsForPassword records.
    pub fn password_policy(&mut self) -> PasswordPolicy {
        let text = self.text_field(RecordType::PasswordPolicy);
        let symbols = self.text_field(RecordType::OwnSymbolsForPassword);
        PasswordPolicy::decode(&text, &symbols)
    }

    pub fn set_password_policy(&mut self, policy: &PasswordPolicy) -> Result<()> {
        self.set_text(RecordType::PasswordPolicy, &policy.encode())?;
        self.set_text(RecordType::OwnSymbolsForPassword, &policy.special_symbol_text())
    }

    /// Autotype tokens with field commands replaced by this entry's
    /// values. TwoFactorCode, Delay, Wait and Legacy stay as commands.
    pub fn autotype_tokens(&mut self) -> Vec<AutotypeToken> {
        let sequence = self.autotype();
        let mut out = Vec::new();
        for token in AutotypeTokens::new(&sequence) {
            let command = match token {
                AutotypeToken::Command(command) => command,
                key => {
                    out.push(key);
                    continue;
                }
            };
            let text: Zeroizing<String> = Zeroizing::new(match command {
                AutotypeCommand::UserName => self.user_name(),
                AutotypeCommand::Password => self.password().to_string(),
                AutotypeCommand::Group => self.group().to_string(),
                AutotypeCommand::Title => self.title(),
                AutotypeCommand::Url => self.url(),
                AutotypeCommand::Email => self.email(),
                AutotypeCommand::CreditCardNumber => {
                    credit_card_digits(&self.credit_card_number(), false)
                }
                AutotypeCommand::CreditCardNumberTabbed => {
                    credit_card_digits(&self.credit_card_number(), true)
                }
                AutotypeCommand::CreditCardExpiration => self.credit_card_expiration(),
                AutotypeCommand::CreditCardVerificationValue => {
                    self.credit_card_verification_value()
                }
                AutotypeCommand::CreditCardPin => self.credit_card_pin(),
                AutotypeCommand::Notes(line) => {
                    let notes = self.notes();
                    let lines = note_lines(&notes);
                    match line {
                        None => lines.join("\n"),
                        Some(n) => (n as usize)
                            .checked_sub(1)
                            .and_then(|i| lines.get(i))
                            .map(|s| s.to_string())
                            .unwrap_or_default(),
                    }
                }
                AutotypeCommand::TwoFactorCode
                | AutotypeCommand::Delay(_)
                | AutotypeCommand::Wait(_)
                | AutotypeCommand::Legacy => {
                    out.push(AutotypeToken::Command(command));
                    continue;
                }
            });
            out.extend(text_to_keys(&text));
        }
        out
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}

// ---------------------------------------------------------------------------
// EntryCollection
// ---------------------------------------------------------------------------

/// The document's entries, in file order.
#[derive(Debug)]
pub struct EntryCollection {
    items: Vec<Entry>,
    state: Rc<DocumentState>,
}

impl EntryCollection {
    pub(crate) fn from_entries(state: Rc<DocumentState>, mut items: Vec<Entry>) -> Self {
        for entry in &mut items {
            entry.records.attach(state.clone());
        }
        Self { items, state }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entry> {
        self.items.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.items.get_mut(index)
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

    pub fn add(&mut self, mut entry: Entry) -> Result<()> {
        self.ensure_writable()?;
        entry.records.attach(self.state.clone());
        self.items.push(entry);
        self.state.mark_changed();
        Ok(())
    }

    pub fn insert(&mut self, index: usize, mut entry: Entry) -> Result<()> {
        self.ensure_writable()?;
        if index > self.items.len() {
            return Err(PwVaultError::InvalidArgument(format!(
                "index {index} is past the end of the entries"
            )));
        }
        entry.records.attach(self.state.clone());
        self.items.insert(index, entry);
        self.state.mark_changed();
        Ok(())
    }

    /// Remove the entry at `index`. The returned entry is detached.
    pub fn remove_at(&mut self, index: usize) -> Result<Entry> {
        self.ensure_writable()?;
        if index >= self.items.len() {
            return Err(PwVaultError::InvalidArgument(format!(
                "no entry at index {index}"
            )));
        }
        let mut entry = self.items.remove(index);
        entry.records.detach();
        self.state.mark_changed();
        Ok(entry)
    }

    /// Remove the first entry titled `title` (ignoring case).
    pub fn remove_title(&mut self, title: &str) -> Result<Option<Entry>> {
        self.ensure_writable()?;
        match self.position(title) {
            Some(index) => self.remove_at(index).map(Some),
            None => Ok(None),
        }
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        for entry in &mut self.items {
            entry.records.detach();
        }
        self.items.clear();
        self.state.mark_changed();
        Ok(())
    }

    fn position(&self, title: &str) -> Option<usize> {
        self.items.iter().position(|e| same_title(e, title))
    }

    fn position_in_group(&self, group: &GroupPath, title: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|e| e.group() == *group && same_title(e, title))
    }

    /// First entry titled `title`, ignoring case.
    pub fn find(&self, title: &str) -> Option<&Entry> {
        self.position(title).map(|i| &self.items[i])
    }

    pub fn find_mut(&mut self, title: &str) -> Option<&mut Entry> {
        self.position(title).map(move |i| &mut self.items[i])
    }

    pub fn find_in_group(&self, group: &GroupPath, title: &str) -> Option<&Entry> {
        self.position_in_group(group, title).map(|i| &self.items[i])
    }

    pub fn find_in_group_mut(&mut self, group: &GroupPath, title: &str) -> Option<&mut Entry> {
        self.position_in_group(group, title)
            .map(move |i| &mut self.items[i])
    }

    /// The entry titled `title`, created and added when missing. On a
    /// read-only document a missing entry is a detached stand-in.
    pub fn entry(&mut self, title: &str) -> Result<EntryRef<'_>> {
        let index = self.position(title);
        self.entry_at_or_create(index, || Entry::with_title(title))
    }

    /// Like `entry`, matching the group as well.
    pub fn entry_in_group(&mut self, group: &GroupPath, title: &str) -> Result<EntryRef<'_>> {
        let index = self.position_in_group(group, title);
        self.entry_at_or_create(index, || Entry::with_group(group, title))
    }

    fn entry_at_or_create(
        &mut self,
        index: Option<usize>,
        create: impl FnOnce() -> Result<Entry>,
    ) -> Result<EntryRef<'_>> {
        let index = match index {
            Some(index) => index,
            None if self.is_read_only() => return Ok(EntryRef::Detached(create()?)),
            None => {
                self.add(create()?)?;
                self.items.len() - 1
            }
        };
        Ok(EntryRef::Attached(&mut self.items[index]))
    }

    /// Order by group, then title, ignoring case. Reordering is not a
    /// change to any entry.
    pub fn sort(&mut self) {
        self.items.sort_by_cached_key(|e| {
            (
                e.group().as_str().to_lowercase(),
                e.title().to_lowercase(),
            )
        });
    }
}

fn same_title(entry: &Entry, title: &str) -> bool {
    entry.title().to_lowercase() == title.to_lowercase()
}

impl<'a> IntoIterator for &'a EntryCollection {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// EntryRef
// ---------------------------------------------------------------------------

/// Result of `EntryCollection::entry`: either an entry of the collection
/// or, on a read-only document, a throwaway stand-in.
#[derive(Debug)]
pub enum EntryRef<'a> {
    Attached(&'a mut Entry),
    Detached(Entry),
}

impl EntryRef<'_> {
    pub fn is_detached(&self) -> bool {
        matches!(self, EntryRef::Detached(_))
    }
}

impl Deref for EntryRef<'_> {
    type Target = Entry;

    fn deref(&self) -> &Entry {
        match self {
            EntryRef::Attached(entry) => entry,
            EntryRef::Detached(entry) => entry,
        }
    }
}

impl DerefMut for EntryRef<'_> {
    fn deref_mut(&mut self) -> &mut Entry {
        match self {
            EntryRef::Attached(entry) => entry,
            EntryRef::Detached(entry) => entry,
        }
    }
}
