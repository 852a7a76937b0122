//! Cryptographic primitives for pwvault.
//!
//! This module provides:
//! - Twofish-256 ECB/CBC block chaining as used by the PWS3 format (`cipher`)
//! - Iterated SHA-256 key stretching and random material (`kdf`)
//! - Stretched-key and K/L data-key wrappers that zero on drop (`keys`)
//! - AES-256-GCM in-memory obfuscation of secret bytes (`secret_box`)

pub mod cipher;
pub mod kdf;
pub mod keys;
pub mod secret_box;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{stretch_key, SecretBox, ...};
pub use cipher::{cbc_decrypt, ecb_decrypt, ecb_encrypt, CbcEncryptor, BLOCK_LEN};
pub use kdf::{generate_salt, random_bytes, stretch_key};
pub use keys::{DataKeys, StretchedKey};
pub use secret_box::SecretBox;
