//! AES-256-GCM obfuscation of secret bytes held in memory.
//!
//! Every `SecretBox` owns a random 32-byte key and keeps its value only
//! in sealed form. Each call to `reseal` draws a fresh key and nonce, so
//! the same plaintext never leaves the same ciphertext behind.
//!
//! This keeps passphrases and field values out of long-lived plaintext
//! buffers. It is not a boundary against an attacker who can read the
//! whole process memory: the key sits right next to the ciphertext.
//!
//! Layout of the sealed buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::kdf::random_bytes;
use crate::errors::{PwVaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// Size of the per-box key in bytes.
const KEY_LEN: usize = 32;

/// A byte buffer that is only ever stored encrypted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBox {
    key: [u8; KEY_LEN],
    sealed: Vec<u8>,
}

impl SecretBox {
    /// Seal `plaintext` under a fresh random key.
    pub fn seal(plaintext: &[u8]) -> Result<Self> {
        let mut secret = Self {
            key: [0u8; KEY_LEN],
            sealed: Vec::new(),
        };
        secret.reseal(plaintext)?;
        Ok(secret)
    }

    /// Replace the stored value, re-keying the box.
    pub fn reseal(&mut self, plaintext: &[u8]) -> Result<()> {
        let key: Zeroizing<[u8; KEY_LEN]> = Zeroizing::new(random_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| PwVaultError::Crypto(format!("invalid key length: {e}")))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| PwVaultError::Crypto(format!("seal failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        self.sealed.zeroize();
        self.sealed = sealed;
        self.key.copy_from_slice(&key[..]);
        Ok(())
    }

    /// Decrypt the stored value into a buffer that is wiped on drop.
    pub fn open(&self) -> Result<Zeroizing<Vec<u8>>> {
        if self.sealed.len() < NONCE_LEN {
            return Err(PwVaultError::Crypto("sealed buffer is truncated".into()));
        }

        let (nonce_bytes, ciphertext) = self.sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| PwVaultError::Crypto(format!("invalid key length: {e}")))?;

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| PwVaultError::Crypto("unseal failed".into()))?;
        Ok(Zeroizing::new(plaintext))
    }

    /// Compare the stored value with `other`.
    pub fn matches(&self, other: &[u8]) -> Result<bool> {
        let current = self.open()?;
        Ok(current.as_slice().ct_eq(other).into())
    }
}

impl fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBox(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_roundtrip() {
        let secret = SecretBox::seal(b"hunter2").unwrap();
        assert_eq!(secret.open().unwrap().as_slice(), b"hunter2");
    }

    #[test]
    fn empty_value_is_supported() {
        let secret = SecretBox::seal(b"").unwrap();
        assert!(secret.open().unwrap().is_empty());
        assert!(secret.matches(b"").unwrap());
    }

    #[test]
    fn reseal_changes_key_and_ciphertext() {
        let mut secret = SecretBox::seal(b"same").unwrap();
        let (key_before, sealed_before) = (secret.key, secret.sealed.clone());

        secret.reseal(b"same").unwrap();
        assert_ne!(secret.key, key_before);
        assert_ne!(secret.sealed, sealed_before);
        assert_eq!(secret.open().unwrap().as_slice(), b"same");
    }

    #[test]
    fn sealed_buffer_does_not_contain_plaintext() {
        let secret = SecretBox::seal(b"plaintext-marker").unwrap();
        assert!(!secret
            .sealed
            .windows(16)
            .any(|w| w == b"plaintext-marker"));
    }

    #[test]
    fn matches_compares_whole_value() {
        let secret = SecretBox::seal(b"abc").unwrap();
        assert!(secret.matches(b"abc").unwrap());
        assert!(!secret.matches(b"abd").unwrap());
        assert!(!secret.matches(b"ab").unwrap());
    }

    #[test]
    fn debug_hides_contents() {
        let secret = SecretBox::seal(b"top-secret").unwrap();
        assert_eq!(format!("{secret:?}"), "SecretBox(..)");
    }
}
