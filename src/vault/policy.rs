//! Password generation policies.
//!
//! A policy is stored in two places:
//! - per entry, in the PasswordPolicy record (19 uppercase hex chars) plus
//!   the OwnSymbolsForPassword record;
//! - per document, as a list of named policies in the
//!   NamedPasswordPolicies header.
//!
//! Both parsers are lenient and never fail; bad input only yields fewer
//! values.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::field::parse_hex;
use super::header::{HeaderCollection, HeaderType};
use crate::errors::{PwVaultError, Result};

/// Longest password a policy may ask for, and the largest minimum count.
pub const MAX_POLICY_VALUE: u16 = 4095;

/// Longest policy name, in chars.
pub const MAX_POLICY_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// PasswordPolicyStyle
// ---------------------------------------------------------------------------

/// Character classes and options of a policy, as 16 flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PasswordPolicyStyle(u16);

impl PasswordPolicyStyle {
    pub const NONE: Self = Self(0);
    pub const USE_LOWERCASE: Self = Self(0x8000);
    pub const USE_UPPERCASE: Self = Self(0x4000);
    pub const USE_DIGITS: Self = Self(0x2000);
    pub const USE_SYMBOLS: Self = Self(0x1000);
    pub const USE_HEX_DIGITS: Self = Self(0x0800);
    pub const USE_EASY_VISION: Self = Self(0x0400);
    pub const MAKE_PRONOUNCEABLE: Self = Self(0x0200);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PasswordPolicyStyle {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PasswordPolicyStyle {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// PasswordPolicy
// ---------------------------------------------------------------------------

/// Rules for generating a password.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PasswordPolicy {
    style: PasswordPolicyStyle,
    total_password_length: u16,
    minimum_lowercase_count: u16,
    minimum_uppercase_count: u16,
    minimum_digit_count: u16,
    minimum_symbol_count: u16,
    special_symbols: Vec<char>,
}

fn check_count(what: &str, value: u16, min: u16) -> Result<u16> {
    if value < min || value > MAX_POLICY_VALUE {
        return Err(PwVaultError::InvalidArgument(format!(
            "{what} must be between {min} and {MAX_POLICY_VALUE}, got {value}"
        )));
    }
    Ok(value)
}

impl PasswordPolicy {
    pub fn new(total_password_length: u16) -> Result<Self> {
        let mut policy = Self::default();
        policy.set_total_password_length(total_password_length)?;
        Ok(policy)
    }

    pub fn style(&self) -> PasswordPolicyStyle {
        self.style
    }

    /// Hex digits exclude every other class: a style containing
    /// `USE_HEX_DIGITS` is reduced to just that flag.
    pub fn set_style(&mut self, style: PasswordPolicyStyle) {
        self.style = if style.contains(PasswordPolicyStyle::USE_HEX_DIGITS) {
            PasswordPolicyStyle::USE_HEX_DIGITS
        } else {
            style
        };
    }

    pub fn total_password_length(&self) -> u16 {
        self.total_password_length
    }

    pub fn set_total_password_length(&mut self, value: u16) -> Result<()> {
        self.total_password_length = check_count("password length", value, 1)?;
        Ok(())
    }

    pub fn minimum_lowercase_count(&self) -> u16 {
        self.minimum_lowercase_count
    }

    pub fn set_minimum_lowercase_count(&mut self, value: u16) -> Result<()> {
        self.minimum_lowercase_count = check_count("lowercase count", value, 0)?;
        Ok(())
    }

    pub fn minimum_uppercase_count(&self) -> u16 {
        self.minimum_uppercase_count
    }

    pub fn set_minimum_uppercase_count(&mut self, value: u16) -> Result<()> {
        self.minimum_uppercase_count = check_count("uppercase count", value, 0)?;
        Ok(())
    }

    pub fn minimum_digit_count(&self) -> u16 {
        self.minimum_digit_count
    }

    pub fn set_minimum_digit_count(&mut self, value: u16) -> Result<()> {
        self.minimum_digit_count = check_count("digit count", value, 0)?;
        Ok(())
    }

    pub fn minimum_symbol_count(&self) -> u16 {
        self.minimum_symbol_count
    }

    pub fn set_minimum_symbol_count(&mut self, value: u16) -> Result<()> {
        self.minimum_symbol_count = check_count("symbol count", value, 0)?;
        Ok(())
    }

    /// Sorted, without duplicates.
    pub fn special_symbols(&self) -> &[char] {
        &self.special_symbols
    }

    pub fn special_symbol_text(&self) -> String {
        self.special_symbols.iter().collect()
    }

    pub fn set_special_symbols(&mut self, symbols: &str) {
        let mut set: Vec<char> = symbols.chars().collect();
        set.sort_unstable();
        set.dedup();
        self.special_symbols = set;
    }

    /// `style(4) total(3) lower(3) upper(3) digit(3) symbol(3)`, uppercase.
    pub(crate) fn encode(&self) -> String {
        format!(
            "{:04X}{:03X}{:03X}{:03X}{:03X}{:03X}",
            self.style.bits(),
            self.total_password_length,
            self.minimum_lowercase_count,
            self.minimum_uppercase_count,
            self.minimum_digit_count,
            self.minimum_symbol_count
        )
    }

    /// Parse the PasswordPolicy record text. Values are taken in order
    /// until the first one that is missing, not hex or out of range.
    pub(crate) fn decode(text: &str, symbols: &str) -> Self {
        let mut policy = Self::default();
        policy.set_special_symbols(symbols);

        let chars: Vec<char> = text.chars().collect();
        let mut cursor = Cursor::new(&chars);

        let Some(style) = cursor.hex(4) else {
            return policy;
        };
        policy.set_style(PasswordPolicyStyle::from_bits(style as u16));

        let setters: [fn(&mut Self, u16) -> Result<()>; 5] = [
            Self::set_total_password_length,
            Self::set_minimum_lowercase_count,
            Self::set_minimum_uppercase_count,
            Self::set_minimum_digit_count,
            Self::set_minimum_symbol_count,
        ];
        for set in setters {
            let Some(value) = cursor.hex(3) else {
                break;
            };
            if set(&mut policy, value as u16).is_err() {
                tracing::warn!("password policy value {value} is out of range; ignoring the rest");
                break;
            }
        }
        policy
    }
}

/// Sequential reader over fixed-width hex fields.
struct Cursor<'a> {
    chars: &'a [char],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(chars: &'a [char]) -> Self {
        Self { chars, pos: 0 }
    }

    fn take(&mut self, width: usize) -> Option<&'a [char]> {
        let slice = self.chars.get(self.pos..self.pos + width)?;
        self.pos += width;
        Some(slice)
    }

    fn hex(&mut self, width: usize) -> Option<u32> {
        let slice = self.chars.get(self.pos..self.pos + width)?;
        let value = parse_hex(slice)?;
        self.pos += width;
        Some(value)
    }
}

// ---------------------------------------------------------------------------
// NamedPasswordPolicy
// ---------------------------------------------------------------------------

/// A policy stored at document level under a unique name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPasswordPolicy {
    name: String,
    policy: PasswordPolicy,
}

impl NamedPasswordPolicy {
    pub fn new(name: &str, total_password_length: u16) -> Result<Self> {
        Self::from_policy(name, PasswordPolicy::new(total_password_length)?)
    }

    pub fn from_policy(name: &str, policy: PasswordPolicy) -> Result<Self> {
        let len = name.chars().count();
        if len == 0 || len > MAX_POLICY_NAME_LEN {
            return Err(PwVaultError::InvalidArgument(format!(
                "policy name must be 1 to {MAX_POLICY_NAME_LEN} characters"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            policy,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut PasswordPolicy {
        &mut self.policy
    }
}

impl fmt::Display for NamedPasswordPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Encode the NamedPasswordPolicies header text.
pub(crate) fn encode_named(policies: &[NamedPasswordPolicy]) -> String {
    let mut text = format!("{:02X}", policies.len());
    for item in policies {
        let symbols = item.policy.special_symbol_text();
        text.push_str(&format!("{:02X}", item.name.chars().count()));
        text.push_str(&item.name);
        text.push_str(&item.policy.encode());
        text.push_str(&format!("{:02X}", symbols.chars().count()));
        text.push_str(&symbols);
    }
    text
}

/// Decode the NamedPasswordPolicies header text.
///
/// Decoding stops at the first structurally broken policy. A policy that
/// parses but carries invalid values is skipped.
pub(crate) fn decode_named(text: &str) -> Vec<NamedPasswordPolicy> {
    let chars: Vec<char> = text.chars().collect();
    let mut cursor = Cursor::new(&chars);
    let mut policies = Vec::new();

    let Some(count) = cursor.hex(2) else {
        return policies;
    };
    for _ in 0..count {
        match decode_one(&mut cursor) {
            Some(Ok(policy)) => policies.push(policy),
            Some(Err(e)) => tracing::warn!("skipping named password policy: {e}"),
            None => {
                tracing::warn!(
                    "named password policy text is malformed; keeping {} policies",
                    policies.len()
                );
                break;
            }
        }
    }
    policies
}

fn decode_one(cursor: &mut Cursor<'_>) -> Option<Result<NamedPasswordPolicy>> {
    let name_len = cursor.hex(2)? as usize;
    let name: String = cursor.take(name_len)?.iter().collect();
    let style = cursor.hex(4)? as u16;
    let mut values = [0u16; 5];
    for value in values.iter_mut() {
        *value = cursor.hex(3)? as u16;
    }
    let symbol_len = cursor.hex(2)? as usize;
    let symbols: String = cursor.take(symbol_len)?.iter().collect();

    let build = || -> Result<NamedPasswordPolicy> {
        let mut policy = PasswordPolicy::new(values[0])?;
        policy.set_style(PasswordPolicyStyle::from_bits(style));
        policy.set_minimum_lowercase_count(values[1])?;
        policy.set_minimum_uppercase_count(values[2])?;
        policy.set_minimum_digit_count(values[3])?;
        policy.set_minimum_symbol_count(values[4])?;
        policy.set_special_symbols(&symbols);
        NamedPasswordPolicy::from_policy(&name, policy)
    };
    Some(build())
}

// ---------------------------------------------------------------------------
// NamedPasswordPolicies
// ---------------------------------------------------------------------------

/// Editable view of a document's named policies. Every change rewrites
/// the NamedPasswordPolicies header.
pub struct NamedPasswordPolicies<'a> {
    headers: &'a mut HeaderCollection,
    items: Vec<NamedPasswordPolicy>,
}

impl<'a> NamedPasswordPolicies<'a> {
    pub(crate) fn new(headers: &'a mut HeaderCollection) -> Result<Self> {
        let items = match headers.find(HeaderType::NamedPasswordPolicies) {
            Some(header) => decode_named(&header.text()?),
            None => Vec::new(),
        };
        Ok(Self { headers, items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NamedPasswordPolicy> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NamedPasswordPolicy> {
        self.items.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&NamedPasswordPolicy> {
        self.items.iter().find(|p| p.name == name)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.headers.is_read_only() {
            return Err(PwVaultError::ReadOnly);
        }
        Ok(())
    }

    /// Add a policy. Names are unique.
    pub fn add(&mut self, policy: NamedPasswordPolicy) -> Result<()> {
        self.ensure_writable()?;
        if self.find(&policy.name).is_some() {
            return Err(PwVaultError::InvalidArgument(format!(
                "password policy '{}' already exists",
                policy.name
            )));
        }
        self.items.push(policy);
        self.save()
    }

    /// Remove the policy called `name`, returning it if it existed.
    pub fn remove(&mut self, name: &str) -> Result<Option<NamedPasswordPolicy>> {
        self.ensure_writable()?;
        let Some(index) = self.items.iter().position(|p| p.name == name) else {
            return Ok(None);
        };
        let removed = self.items.remove(index);
        self.save()?;
        Ok(Some(removed))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.items.clear();
        self.save()
    }

    /// Edit the policy called `name` in place.
    pub fn update<F>(&mut self, name: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut PasswordPolicy) -> Result<()>,
    {
        self.ensure_writable()?;
        let item = self
            .items
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PwVaultError::InvalidArgument(format!("no password policy '{name}'")))?;
        edit(&mut item.policy)?;
        self.save()
    }

    fn save(&mut self) -> Result<()> {
        let text = encode_named(&self.items);
        self.headers
            .field(HeaderType::NamedPasswordPolicies)?
            .set_text(&text)
    }
}
