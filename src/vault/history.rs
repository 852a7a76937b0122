//! Password history stored in an entry's PasswordHistory record.
//!
//! Text layout (hex written lowercase):
//!
//! ```text
//! flag(1) max(2) count(2) { time(8) length(4) password(length) }*
//! ```
//!
//! A flag of `0` means disabled. Parsing is lenient: an unreadable
//! maximum falls back to 3 and the item list stops at the first
//! malformed item.

use std::fmt;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use super::field::parse_hex;
use super::record::{RecordCollection, RecordType};
use crate::errors::{PwVaultError, Result};

/// Number of passwords remembered when the record does not say.
pub const DEFAULT_MAXIMUM_COUNT: usize = 3;

/// A password that was in use before the current one.
#[derive(Clone)]
pub struct PasswordHistoryItem {
    time_first_used: DateTime<Utc>,
    password: Zeroizing<String>,
}

impl PasswordHistoryItem {
    pub fn time_first_used(&self) -> DateTime<Utc> {
        self.time_first_used
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for PasswordHistoryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHistoryItem")
            .field("time_first_used", &self.time_first_used)
            .finish_non_exhaustive()
    }
}

/// Live view of one entry's password history.
///
/// Every mutation re-encodes the PasswordHistory record immediately, so
/// it goes through the entry's normal change tracking.
pub struct PasswordHistory<'a> {
    records: &'a mut RecordCollection,
    enabled: bool,
    maximum_count: usize,
    items: Vec<PasswordHistoryItem>,
}

impl<'a> PasswordHistory<'a> {
    pub(crate) fn new(records: &'a mut RecordCollection) -> Result<Self> {
        let text = match records.find(RecordType::PasswordHistory) {
            Some(record) => Zeroizing::new(record.text()?),
            None => Zeroizing::new(String::new()),
        };
        let (enabled, maximum_count, items) = decode(&text);
        Ok(Self {
            records,
            enabled,
            maximum_count,
            items,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling also forgets every stored password.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        if self.enabled == enabled {
            return Ok(());
        }
        self.ensure_writable()?;
        self.enabled = enabled;
        if !enabled {
            self.items.clear();
        }
        self.save()
    }

    pub fn maximum_count(&self) -> usize {
        self.maximum_count
    }

    /// Set how many passwords are kept (1 to 255), dropping the oldest
    /// ones that no longer fit.
    pub fn set_maximum_count(&mut self, count: usize) -> Result<()> {
        if !(1..=255).contains(&count) {
            return Err(PwVaultError::InvalidArgument(format!(
                "history size must be between 1 and 255, got {count}"
            )));
        }
        if self.maximum_count == count {
            return Ok(());
        }
        self.ensure_writable()?;
        self.maximum_count = count;
        self.trim();
        self.save()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, PasswordHistoryItem> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PasswordHistoryItem> {
        self.items.get(index)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.items.clear();
        self.save()
    }

    /// Remember `password` as used since `time`. Ignored while disabled
    /// or for an empty password.
    pub(crate) fn add(&mut self, time: DateTime<Utc>, password: &str) -> Result<()> {
        if !self.enabled || password.is_empty() {
            return Ok(());
        }
        self.ensure_writable()?;
        self.items.push(PasswordHistoryItem {
            time_first_used: time,
            password: Zeroizing::new(password.to_string()),
        });
        self.trim();
        self.save()
    }

    fn trim(&mut self) {
        if self.items.len() > self.maximum_count {
            let excess = self.items.len() - self.maximum_count;
            self.items.drain(..excess);
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.records.is_read_only() {
            return Err(PwVaultError::ReadOnly);
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let text = encode(self.enabled, self.maximum_count, &self.items);
        self.records.put(RecordType::PasswordHistory, text.as_bytes())
    }
}

fn decode(text: &str) -> (bool, usize, Vec<PasswordHistoryItem>) {
    let chars: Zeroizing<Vec<char>> = Zeroizing::new(text.chars().collect());
    let mut items = Vec::new();
    if chars.len() < 5 {
        return (false, DEFAULT_MAXIMUM_COUNT, items);
    }

    let enabled = chars[0] != '0';
    let maximum_count = parse_hex(&chars[1..3])
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAXIMUM_COUNT);
    let count = parse_hex(&chars[3..5]).unwrap_or(0);

    let mut pos = 5;
    for _ in 0..count {
        let header = chars.get(pos..pos + 12);
        let parsed = header.and_then(|h| Some((parse_hex(&h[..8])?, parse_hex(&h[8..])?)));
        let Some((seconds, length)) = parsed else {
            tracing::warn!("password history text is malformed; keeping {} items", items.len());
            break;
        };
        pos += 12;

        let Some(password) = chars.get(pos..pos + length as usize) else {
            tracing::warn!("password history text is truncated; keeping {} items", items.len());
            break;
        };
        pos += length as usize;

        let time_first_used =
            DateTime::from_timestamp(i64::from(seconds), 0).unwrap_or(DateTime::UNIX_EPOCH);
        items.push(PasswordHistoryItem {
            time_first_used,
            password: Zeroizing::new(password.iter().collect()),
        });
    }

    (enabled, maximum_count, items)
}

fn encode(enabled: bool, maximum_count: usize, items: &[PasswordHistoryItem]) -> Zeroizing<String> {
    let mut text = Zeroizing::new(String::new());
    text.push(if enabled { '1' } else { '0' });
    text.push_str(&format!("{maximum_count:02x}{:02x}", items.len()));
    for item in items {
        let seconds = item.time_first_used.timestamp().clamp(0, i64::from(u32::MAX));
        text.push_str(&format!("{seconds:08x}{:04x}", item.password.chars().count()));
        text.push_str(&item.password);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::document::DocumentState;
    use crate::vault::record::Record;

    fn records_with_history(text: &str) -> RecordCollection {
        let mut records = RecordCollection::new();
        records
            .add(Record::with_text(RecordType::Password, "current").unwrap())
            .unwrap();
        records
            .add(Record::with_text(RecordType::PasswordHistory, text).unwrap())
            .unwrap();
        records
    }

    fn history_text(records: &RecordCollection) -> String {
        records
            .find(RecordType::PasswordHistory)
            .unwrap()
            .text()
            .unwrap()
    }

    #[test]
    fn decodes_items_in_order() {
        let mut records = records_with_history("10502000000100003abc000000200003def");
        let history = PasswordHistory::new(&mut records).unwrap();
        assert!(history.is_enabled());
        assert_eq!(history.maximum_count(), 5);
        assert_eq!(history.len(), 2);
        assert_eq!(history.get(0).unwrap().password(), "abc");
        assert_eq!(history.get(0).unwrap().time_first_used().timestamp(), 0x10);
        assert_eq!(history.get(1).unwrap().password(), "def");
    }

    #[test]
    fn missing_or_short_text_is_disabled_default() {
        let mut records = RecordCollection::new();
        let history = PasswordHistory::new(&mut records).unwrap();
        assert!(!history.is_enabled());
        assert_eq!(history.maximum_count(), DEFAULT_MAXIMUM_COUNT);

        let mut records = records_with_history("1ff");
        let history = PasswordHistory::new(&mut records).unwrap();
        assert!(!history.is_enabled());
    }

    #[test]
    fn unreadable_maximum_falls_back_to_three() {
        let mut records = records_with_history("1zz00");
        let history = PasswordHistory::new(&mut records).unwrap();
        assert!(history.is_enabled());
        assert_eq!(history.maximum_count(), 3);
    }

    #[test]
    fn malformed_item_keeps_earlier_items() {
        let mut records = records_with_history("10303000000100003abcXXXXXXXX0003def");
        let history = PasswordHistory::new(&mut records).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(0).unwrap().password(), "abc");

        let mut records = records_with_history("10301000000100003ab");
        let history = PasswordHistory::new(&mut records).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn add_trims_oldest_and_encodes_lowercase() {
        let mut records = records_with_history("10200");
        let mut history = PasswordHistory::new(&mut records).unwrap();
        let t = |s| DateTime::from_timestamp(s, 0).unwrap();
        history.add(t(0xAB), "one").unwrap();
        history.add(t(0xCD), "two").unwrap();
        history.add(t(0xEF), "three").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.get(0).unwrap().password(), "two");

        assert_eq!(
            history_text(&records),
            "10202000000cd0003two000000ef0005three"
        );
    }

    #[test]
    fn add_ignores_disabled_and_empty() {
        let mut records = records_with_history("00300");
        let mut history = PasswordHistory::new(&mut records).unwrap();
        history.add(Utc::now(), "pw").unwrap();
        assert!(history.is_empty());

        history.set_enabled(true).unwrap();
        history.add(Utc::now(), "").unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn disabling_clears_items() {
        let mut records = records_with_history("10501000000100003abc");
        let mut history = PasswordHistory::new(&mut records).unwrap();
        history.set_enabled(false).unwrap();
        assert!(history.is_empty());
        assert_eq!(history_text(&records), "00500");
    }

    #[test]
    fn shrinking_maximum_trims() {
        let mut records = records_with_history("10502000000100003abc000000200003def");
        let mut history = PasswordHistory::new(&mut records).unwrap();
        history.set_maximum_count(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(0).unwrap().password(), "def");
        assert!(history.set_maximum_count(0).is_err());
        assert!(history.set_maximum_count(256).is_err());
    }

    #[test]
    fn enabling_creates_record() {
        let mut records = RecordCollection::new();
        let mut history = PasswordHistory::new(&mut records).unwrap();
        history.set_enabled(true).unwrap();
        assert_eq!(history_text(&records), "10300");
    }

    #[test]
    fn changing_password_records_outgoing_one() {
        let mut records = records_with_history("10300");
        records
            .field(RecordType::Password)
            .unwrap()
            .set_text("next")
            .unwrap();

        let history = PasswordHistory::new(&mut records).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(0).unwrap().password(), "current");
    }

    #[test]
    fn setting_same_password_records_nothing() {
        let mut records = records_with_history("10300");
        records
            .field(RecordType::Password)
            .unwrap()
            .set_text("current")
            .unwrap();
        assert!(PasswordHistory::new(&mut records).unwrap().is_empty());
    }

    #[test]
    fn history_is_bounded_across_many_changes() {
        let mut records = records_with_history("10200");
        for pw in ["a", "b", "c", "d", "e"] {
            records.field(RecordType::Password).unwrap().set_text(pw).unwrap();
        }
        let history = PasswordHistory::new(&mut records).unwrap();
        let kept: Vec<_> = history.iter().map(|i| i.password().to_string()).collect();
        assert_eq!(kept, vec!["c", "d"]);
    }

    #[test]
    fn read_only_history_cannot_change() {
        let state = DocumentState::new();
        let mut records = records_with_history("10300");
        records.attach(state.clone());
        state.set_read_only(true);

        let mut history = PasswordHistory::new(&mut records).unwrap();
        assert!(matches!(history.clear(), Err(PwVaultError::ReadOnly)));
        assert!(matches!(history.set_enabled(false), Err(PwVaultError::ReadOnly)));
    }
}
