//! Key material for the PWS3 format.
//!
//! From the passphrase we stretch a single **stretched key**. It never
//! touches vault data directly; it only:
//! - proves the passphrase, via `SHA256(stretched)` stored in the file, and
//! - wraps the two random **data keys** with Twofish-ECB.
//!
//! The data keys are K (CBC key for the field stream) and L (HMAC-SHA256
//! key for the authentication tag). Every wrapper here zeroes its bytes
//! when dropped.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cipher;
use super::kdf::random_bytes;
use crate::errors::{PwVaultError, Result};

/// Length of every key in the format (256 bits).
pub const KEY_LEN: usize = 32;

/// The iterated SHA-256 output of passphrase and salt.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct StretchedKey {
    bytes: [u8; KEY_LEN],
}

impl StretchedKey {
    /// Create a new `StretchedKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// `SHA256(stretched key)`, as stored at offset 40 of the file.
    pub fn check_hash(&self) -> [u8; KEY_LEN] {
        let mut out = [0u8; KEY_LEN];
        out.copy_from_slice(&Sha256::digest(self.bytes));
        out
    }

    /// Compare the stored check hash in constant time.
    pub fn verify(&self, stored_hash: &[u8]) -> bool {
        let mut computed = self.check_hash();
        let same: bool = computed[..].ct_eq(stored_hash).into();
        computed.zeroize();
        same
    }

    /// Wrap a data key with Twofish-ECB.
    pub fn wrap(&self, key: &[u8; KEY_LEN]) -> Result<[u8; KEY_LEN]> {
        let mut out = *key;
        cipher::ecb_encrypt(&self.bytes, &mut out)?;
        Ok(out)
    }

    /// Unwrap a data key stored with Twofish-ECB.
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<[u8; KEY_LEN]> {
        if wrapped.len() != KEY_LEN {
            return Err(PwVaultError::Crypto(format!(
                "wrapped key must be {KEY_LEN} bytes, got {}",
                wrapped.len()
            )));
        }
        let mut out = [0u8; KEY_LEN];
        out.copy_from_slice(wrapped);
        cipher::ecb_decrypt(&self.bytes, &mut out)?;
        Ok(out)
    }
}

/// The pair of data keys: K encrypts, L authenticates.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKeys {
    cipher_key: [u8; KEY_LEN],
    hmac_key: [u8; KEY_LEN],
}

impl DataKeys {
    /// Draw fresh random K and L.
    pub fn generate() -> Self {
        Self {
            cipher_key: random_bytes(),
            hmac_key: random_bytes(),
        }
    }

    /// Build from already-unwrapped K and L.
    pub fn new(cipher_key: [u8; KEY_LEN], hmac_key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher_key,
            hmac_key,
        }
    }

    /// Split a 64-byte `K || L` buffer.
    pub fn from_concatenated(keys: &[u8; 2 * KEY_LEN]) -> Self {
        let mut cipher_key = [0u8; KEY_LEN];
        let mut hmac_key = [0u8; KEY_LEN];
        cipher_key.copy_from_slice(&keys[..KEY_LEN]);
        hmac_key.copy_from_slice(&keys[KEY_LEN..]);
        Self {
            cipher_key,
            hmac_key,
        }
    }

    /// K, the Twofish-CBC key for the field stream.
    pub fn cipher_key(&self) -> &[u8; KEY_LEN] {
        &self.cipher_key
    }

    /// L, the HMAC-SHA256 key.
    pub fn hmac_key(&self) -> &[u8; KEY_LEN] {
        &self.hmac_key
    }
}
