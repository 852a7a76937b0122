//! Typed, in-memory-encrypted field values.
//!
//! Both headers and records are a one-byte type code plus opaque bytes.
//! The type code decides how the bytes are interpreted (`DataType`):
//!
//! ```text
//! Version  u16 LE, exactly 2 bytes
//! Uuid     16 raw bytes
//! Text     UTF-8 (decoded lossily)
//! Time     u32 LE seconds since the epoch, or 8 ASCII hex digits
//! Binary   raw bytes
//! Unknown  any of the above
//! ```
//!
//! The value itself lives in a `SecretBox` and is only decrypted for the
//! duration of a read.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::SecretBox;
use crate::errors::{PwVaultError, Result};

/// Type code that terminates a header block or an entry on disk.
pub const END_OF_ENTRY: u8 = 0xFF;

// ---------------------------------------------------------------------------
// DataType / FieldKind
// ---------------------------------------------------------------------------

/// How the bytes of a field are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Unknown,
    Version,
    Uuid,
    Text,
    Time,
    Binary,
}

impl DataType {
    /// Succeeds if a field of this type may be read or written as `wanted`.
    pub fn check(self, wanted: DataType) -> Result<()> {
        if self == wanted || self == DataType::Unknown {
            Ok(())
        } else {
            Err(PwVaultError::FieldTypeMismatch {
                expected: wanted,
                actual: self,
            })
        }
    }
}

/// A field type enumeration (`HeaderType` or `RecordType`).
pub trait FieldKind: Copy + Eq + fmt::Debug {
    /// The on-disk type code.
    fn code(self) -> u8;

    /// Map an on-disk type code back, keeping unknown codes.
    fn from_code(code: u8) -> Self;

    /// Interpretation of fields of this type.
    fn data_type(self) -> DataType;
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// One typed value. `Header` and `Record` are the two instantiations.
#[derive(Clone)]
pub struct Field<K: FieldKind> {
    kind: K,
    data: SecretBox,
}

impl<K: FieldKind> Field<K> {
    /// An empty field of the given type.
    pub fn new(kind: K) -> Result<Self> {
        Self::with_bytes(kind, &[])
    }

    /// A field holding a copy of `value`, whatever its type.
    pub fn with_bytes(kind: K, value: &[u8]) -> Result<Self> {
        if kind.code() == END_OF_ENTRY {
            return Err(PwVaultError::InvalidArgument(
                "end-of-entry is a terminator, not a field type".into(),
            ));
        }
        Ok(Self {
            kind,
            data: SecretBox::seal(value)?,
        })
    }

    pub fn with_text(kind: K, value: &str) -> Result<Self> {
        let bytes = encode_text(kind, value)?;
        Self::with_bytes(kind, &bytes)
    }

    pub fn with_time(kind: K, value: DateTime<Utc>) -> Result<Self> {
        let bytes = encode_time(kind, value)?;
        Self::with_bytes(kind, &bytes)
    }

    pub fn with_uuid(kind: K, value: Uuid) -> Result<Self> {
        let bytes = encode_uuid(kind, value)?;
        Self::with_bytes(kind, &bytes)
    }

    pub fn with_version(kind: K, value: u16) -> Result<Self> {
        let bytes = encode_version(kind, value)?;
        Self::with_bytes(kind, &bytes)
    }

    pub fn kind(&self) -> K {
        self.kind
    }

    pub fn data_type(&self) -> DataType {
        self.kind.data_type()
    }

    /// Copy of the raw value. No type check.
    pub fn bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.data.open()
    }

    /// UTF-8 text, with invalid sequences replaced.
    pub fn text(&self) -> Result<String> {
        self.data_type().check(DataType::Text)?;
        let data = self.data.open()?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Timestamp, or `None` if the stored bytes are not a valid time.
    pub fn time(&self) -> Result<Option<DateTime<Utc>>> {
        self.data_type().check(DataType::Time)?;
        let data = self.data.open()?;
        let seconds = match data.len() {
            4 => Some(u32::from_le_bytes([data[0], data[1], data[2], data[3]])),
            8 => std::str::from_utf8(&data)
                .ok()
                .and_then(|s| u32::from_str_radix(s, 16).ok()),
            _ => None,
        };
        Ok(seconds.and_then(|s| DateTime::from_timestamp(i64::from(s), 0)))
    }

    /// UUID, or `None` unless exactly 16 bytes are stored.
    pub fn uuid(&self) -> Result<Option<Uuid>> {
        self.data_type().check(DataType::Uuid)?;
        let data = self.data.open()?;
        Ok(Uuid::from_slice(&data).ok())
    }

    /// Format version, or `None` unless exactly 2 bytes are stored.
    pub fn version(&self) -> Result<Option<u16>> {
        self.data_type().check(DataType::Version)?;
        let data = self.data.open()?;
        Ok(match data.len() {
            2 => Some(u16::from_le_bytes([data[0], data[1]])),
            _ => None,
        })
    }

    /// Store `value`, re-keying the box. Returns `false` without touching
    /// anything when the value is unchanged.
    pub(crate) fn replace(&mut self, value: &[u8]) -> Result<bool> {
        if self.data.matches(value)? {
            return Ok(false);
        }
        self.data.reseal(value)?;
        Ok(true)
    }
}

impl<K: FieldKind> fmt::Debug for Field<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("kind", &self.kind)
            .field("data", &self.data)
            .finish()
    }
}

/// Human-readable rendering by data type. Prints secrets in the clear.
impl<K: FieldKind> fmt::Display for Field<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data_type() {
            DataType::Version => match self.version().map_err(|_| fmt::Error)? {
                Some(v) => write!(f, "{v:04X}"),
                None => f.write_str("????"),
            },
            DataType::Uuid => match self.uuid().map_err(|_| fmt::Error)? {
                Some(u) => write!(f, "{u}"),
                None => write!(f, "{}", Uuid::nil()),
            },
            DataType::Text => f.write_str(&self.text().map_err(|_| fmt::Error)?),
            DataType::Time => match self.time().map_err(|_| fmt::Error)? {
                Some(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S UTC")),
                None => f.write_str("-"),
            },
            DataType::Binary | DataType::Unknown => {
                let data = self.bytes().map_err(|_| fmt::Error)?;
                f.write_str("0x")?;
                for b in data.iter() {
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Value encoding
// ---------------------------------------------------------------------------

pub(crate) fn encode_text<K: FieldKind>(kind: K, value: &str) -> Result<Vec<u8>> {
    kind.data_type().check(DataType::Text)?;
    Ok(value.as_bytes().to_vec())
}

pub(crate) fn encode_time<K: FieldKind>(kind: K, value: DateTime<Utc>) -> Result<Vec<u8>> {
    kind.data_type().check(DataType::Time)?;
    let seconds = u32::try_from(value.timestamp()).map_err(|_| {
        PwVaultError::InvalidArgument(format!("time {value} is outside the storable range"))
    })?;
    Ok(seconds.to_le_bytes().to_vec())
}

pub(crate) fn encode_uuid<K: FieldKind>(kind: K, value: Uuid) -> Result<Vec<u8>> {
    kind.data_type().check(DataType::Uuid)?;
    Ok(value.as_bytes().to_vec())
}

pub(crate) fn encode_version<K: FieldKind>(kind: K, value: u16) -> Result<Vec<u8>> {
    kind.data_type().check(DataType::Version)?;
    Ok(value.to_le_bytes().to_vec())
}

/// Parse a fixed-width hex slice. Unlike `from_str_radix` this rejects
/// signs and empty input.
pub(crate) fn parse_hex(digits: &[char]) -> Option<u32> {
    if digits.is_empty() || digits.len() > 8 || !digits.iter().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let text: String = digits.iter().collect();
    u32::from_str_radix(&text, 16).ok()
}

/// Current time truncated to whole seconds, as stored on disk.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Positional helpers shared by the collections
// ---------------------------------------------------------------------------

/// Index of the `nth` field of `kind`.
pub(crate) fn position_of<K: FieldKind>(items: &[Field<K>], kind: K, nth: usize) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind.code() == kind.code())
        .nth(nth)
        .map(|(i, _)| i)
}

/// How many fields of the same type come before `index`.
pub(crate) fn occurrence_of<K: FieldKind>(items: &[Field<K>], index: usize) -> usize {
    let code = items[index].kind.code();
    items[..index]
        .iter()
        .filter(|f| f.kind.code() == code)
        .count()
}

/// Where a new field of `kind` goes: before the first field with a
/// greater code.
pub(crate) fn insertion_slot<K: FieldKind>(items: &[Field<K>], kind: K) -> usize {
    items
        .iter()
        .position(|f| f.kind.code() > kind.code())
        .unwrap_or(items.len())
}
