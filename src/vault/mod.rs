//! Vault module: the Password Safe v3 document model.
//!
//! This module provides:
//! - Typed fields and their interpretation (`field`)
//! - Document headers and entry records with change tracking (`header`, `record`)
//! - Entries, group paths, password history and policies (`entry`, `group`,
//!   `history`, `policy`)
//! - Autotype sequence tokenizing (`autotype`)
//! - Policy-driven password generation (`generator`)
//! - The PWS3 file format with HMAC integrity (`format`)
//! - `Document`, which ties them together (`document`)

pub mod autotype;
pub mod document;
pub mod entry;
pub mod field;
mod format;
pub mod generator;
pub mod group;
pub mod header;
pub mod history;
pub mod policy;
pub mod record;

// Re-export the most commonly used items.
pub use autotype::{AutotypeCommand, AutotypeToken, AutotypeTokens};
pub use document::Document;
pub use entry::{Entry, EntryCollection, EntryRef};
pub use field::{DataType, Field, FieldKind};
pub use group::GroupPath;
pub use header::{Header, HeaderCollection, HeaderRef, HeaderType, DEFAULT_VERSION};
pub use history::{PasswordHistory, PasswordHistoryItem};
pub use policy::{NamedPasswordPolicies, NamedPasswordPolicy, PasswordPolicy, PasswordPolicyStyle};
pub use record::{Record, RecordCollection, RecordRef, RecordType, DEFAULT_AUTOTYPE};
