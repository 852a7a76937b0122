use std::path::PathBuf;
use thiserror::Error;

use crate::vault::DataType;

/// All errors that can occur in pwvault.
#[derive(Debug, Error)]
pub enum PwVaultError {
    // --- Vault format errors ---
    /// Bad magic, truncated file, wrong passphrase or failed authentication.
    /// The reason is only logged so callers cannot tell the cases apart.
    #[error("Wrong password or damaged file")]
    UnrecognizedFormat(String),

    #[error("Unsupported vault format version {0:#06x}")]
    UnsupportedVersion(u16),

    #[error("Passphrase is not set, cannot save the vault")]
    MissingPassphrase,

    // --- Data model errors ---
    #[error("Field holds {actual:?} data and cannot be read or written as {expected:?}")]
    FieldTypeMismatch { expected: DataType, actual: DataType },

    #[error("Vault is read-only")]
    ReadOnly,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // --- Crypto errors ---
    #[error("Crypto error: {0}")]
    Crypto(String),

    // --- Application errors ---
    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Vault already exists at {0}")]
    VaultAlreadyExists(PathBuf),

    #[error("Entry '{0}' not found")]
    EntryNotFound(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Password mismatch: passwords do not match")]
    PasswordMismatch,
}

impl PwVaultError {
    /// Build an `UnrecognizedFormat` error, logging the real reason.
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::debug!(%reason, "rejecting vault data");
        Self::UnrecognizedFormat(reason)
    }
}

/// Convenience type alias for pwvault results.
pub type Result<T> = std::result::Result<T, PwVaultError>;
