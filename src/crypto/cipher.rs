//! Twofish-256 block chaining for the PWS3 format.
//!
//! The format uses two modes, both without padding:
//! - **ECB** to wrap the 32-byte data keys K and L under the stretched key.
//! - **CBC** for the field stream, keyed with K and seeded with a 16-byte IV.
//!
//! Callers are responsible for block alignment; every function here
//! rejects input that is not a multiple of `BLOCK_LEN`.

use twofish::cipher::generic_array::GenericArray;
use twofish::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use twofish::Twofish;
use zeroize::Zeroize;

use crate::errors::{PwVaultError, Result};

/// Twofish block size in bytes.
pub const BLOCK_LEN: usize = 16;

fn new_cipher(key: &[u8]) -> Result<Twofish> {
    Twofish::new_from_slice(key)
        .map_err(|e| PwVaultError::Crypto(format!("invalid Twofish key: {e}")))
}

fn check_aligned(data: &[u8]) -> Result<()> {
    if data.len() % BLOCK_LEN != 0 {
        return Err(PwVaultError::Crypto(format!(
            "data length {} is not a multiple of {BLOCK_LEN}",
            data.len()
        )));
    }
    Ok(())
}

/// Encrypt `data` in place with Twofish-ECB.
pub fn ecb_encrypt(key: &[u8], data: &mut [u8]) -> Result<()> {
    check_aligned(data)?;
    let cipher = new_cipher(key)?;
    for block in data.chunks_exact_mut(BLOCK_LEN) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// Decrypt `data` in place with Twofish-ECB.
pub fn ecb_decrypt(key: &[u8], data: &mut [u8]) -> Result<()> {
    check_aligned(data)?;
    let cipher = new_cipher(key)?;
    for block in data.chunks_exact_mut(BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// Decrypt `data` in place with Twofish-CBC.
pub fn cbc_decrypt(key: &[u8], iv: &[u8; BLOCK_LEN], data: &mut [u8]) -> Result<()> {
    check_aligned(data)?;
    let cipher = new_cipher(key)?;

    let mut prev = *iv;
    let mut current = [0u8; BLOCK_LEN];
    for block in data.chunks_exact_mut(BLOCK_LEN) {
        current.copy_from_slice(block);
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev = current;
    }
    prev.zeroize();
    current.zeroize();
    Ok(())
}

/// Streaming Twofish-CBC encryptor.
///
/// The save path produces the field stream one padded field at a time,
/// so the chaining value has to survive between calls.
pub struct CbcEncryptor {
    cipher: Twofish,
    chain: [u8; BLOCK_LEN],
}

impl CbcEncryptor {
    /// Start a new CBC stream with key K and the given IV.
    pub fn new(key: &[u8], iv: &[u8; BLOCK_LEN]) -> Result<Self> {
        Ok(Self {
            cipher: new_cipher(key)?,
            chain: *iv,
        })
    }

    /// Encrypt the next run of whole blocks in place.
    pub fn encrypt(&mut self, data: &mut [u8]) -> Result<()> {
        check_aligned(data)?;
        for block in data.chunks_exact_mut(BLOCK_LEN) {
            for (b, c) in block.iter_mut().zip(self.chain.iter()) {
                *b ^= c;
            }
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
            self.chain.copy_from_slice(block);
        }
        Ok(())
    }
}

impl Drop for CbcEncryptor {
    fn drop(&mut self) {
        self.chain.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn ecb_matches_known_answer_for_zero_key() {
        let key = [0u8; 32];
        let mut block = [0u8; 16];
        ecb_encrypt(&key, &mut block).unwrap();
        assert_eq!(block.to_vec(), hex("57FF739D4DC92C1BD7FC01700CC8216F"));

        ecb_decrypt(&key, &mut block).unwrap();
        assert_eq!(block, [0u8; 16]);
    }

    #[test]
    fn ecb_rejects_partial_block() {
        let mut data = [0u8; 20];
        assert!(ecb_encrypt(&[0u8; 32], &mut data).is_err());
    }

    #[test]
    fn cbc_stream_decrypts_back() {
        let key = [7u8; 32];
        let iv = [9u8; 16];
        let plain: Vec<u8> = (0u8..64).collect();

        // Encrypt in two uneven calls to exercise chaining across calls.
        let mut data = plain.clone();
        let mut enc = CbcEncryptor::new(&key, &iv).unwrap();
        enc.encrypt(&mut data[..16]).unwrap();
        enc.encrypt(&mut data[16..]).unwrap();
        assert_ne!(data, plain);

        cbc_decrypt(&key, &iv, &mut data).unwrap();
        assert_eq!(data, plain);
    }

    #[test]
    fn cbc_identical_blocks_encrypt_differently() {
        let mut data = [0u8; 32];
        let mut enc = CbcEncryptor::new(&[1u8; 32], &[2u8; 16]).unwrap();
        enc.encrypt(&mut data).unwrap();
        assert_ne!(data[..16], data[16..]);
    }

    #[test]
    fn rejects_short_key() {
        assert!(CbcEncryptor::new(&[0u8; 5], &[0u8; 16]).is_err());
    }
}
