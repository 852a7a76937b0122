//! Password-based key stretching for PWS3 vaults.
//!
//! The format stretches the passphrase with iterated SHA-256:
//!
//! ```text
//! h0 = SHA256(passphrase || salt)
//! h(i+1) = SHA256(h(i))          for i in 0..iterations
//! ```
//!
//! The iteration count is stored in the file header. Readers use
//! whatever is stored; writers never go below `MIN_ITERATIONS`.

use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::keys::StretchedKey;

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Smallest iteration count written by `Document::save`.
pub const MIN_ITERATIONS: u32 = 2048;

/// Stretch `passphrase` with `salt` over `iterations` extra SHA-256 rounds.
pub fn stretch_key(passphrase: &[u8], salt: &[u8], iterations: u32) -> StretchedKey {
    let mut hasher = Sha256::new();
    hasher.update(passphrase);
    hasher.update(salt);

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());

    for _ in 0..iterations {
        let mut digest = Sha256::digest(hash);
        hash.copy_from_slice(&digest);
        digest.as_mut_slice().zeroize();
    }

    let key = StretchedKey::new(hash);
    hash.zeroize();
    key
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    random_bytes()
}

/// Fill a fixed-size array from the thread-local CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}
