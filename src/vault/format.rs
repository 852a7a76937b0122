//! PWS3 file format: encryption, field framing and HMAC integrity.
//!
//! A `.psafe3` file has this layout:
//!
//! ```text
//! [PWS3: 4][salt: 32][iter: 4 LE][H(P'): 32][B1 B2: 32][B3 B4: 32][IV: 16]
//! [encrypted fields ...][PWS3-EOFPWS3-EOF: 16][HMAC: 32]
//! ```
//!
//! - **Salt / iter**: inputs to the SHA-256 key stretch giving `P'`.
//! - **H(P')**: SHA-256 of the stretched key, used to check the passphrase.
//! - **B1..B4**: the data keys K and L, each Twofish-ECB wrapped under `P'`.
//! - **Fields**: Twofish-CBC under K with the IV above. Each field is
//!   `[len: 4 LE][type: 1][data: len][random pad]`, padded to 16 bytes
//!   with at least one byte of padding.
//! - **HMAC**: HMAC-SHA256 under L over every field's data (not the
//!   length, type or padding).
//!
//! Headers come first and end with an 0xFF field; each entry's records
//! follow, each group ending with its own 0xFF field.

use std::fs;
use std::path::Path;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::field::{Field, FieldKind, END_OF_ENTRY};
use super::header::{Header, HeaderType};
use super::record::{Record, RecordType};
use crate::crypto::kdf::{generate_salt, random_bytes, stretch_key, MIN_ITERATIONS, SALT_LEN};
use crate::crypto::keys::KEY_LEN;
use crate::crypto::{cbc_decrypt, CbcEncryptor, DataKeys, BLOCK_LEN};
use crate::errors::{PwVaultError, Result};

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every vault file.
const MAGIC: &[u8; 4] = b"PWS3";

/// Marker between the encrypted fields and the HMAC.
const EOF_MARKER: &[u8; 16] = b"PWS3-EOFPWS3-EOF";

/// Size of the HMAC tag at the end of the file.
const HMAC_LEN: usize = 32;

/// Offsets of the fixed preamble.
const SALT_OFFSET: usize = 4;
const ITER_OFFSET: usize = SALT_OFFSET + SALT_LEN;
const CHECK_OFFSET: usize = ITER_OFFSET + 4;
const K_OFFSET: usize = CHECK_OFFSET + KEY_LEN;
const L_OFFSET: usize = K_OFFSET + KEY_LEN;
const IV_OFFSET: usize = L_OFFSET + KEY_LEN;
const BODY_OFFSET: usize = IV_OFFSET + BLOCK_LEN;

/// Smallest file a reader accepts.
pub const MIN_FILE_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// How to obtain K and L when opening a file.
pub(crate) enum KeySource<'a> {
    /// Stretch the passphrase, check it and unwrap K and L.
    Passphrase(&'a [u8]),
    /// Use K and L as given. The passphrase check is skipped.
    Keys(&'a DataKeys),
}

/// Everything read out of a vault file.
#[derive(Debug)]
pub(crate) struct RawVault {
    /// Iteration count exactly as stored.
    pub iterations: u32,
    pub headers: Vec<Header>,
    pub entries: Vec<Vec<Record>>,
}

/// Decrypt and verify a whole file.
///
/// Every failure other than an unsupported version comes back as the
/// same `UnrecognizedFormat` error, so a wrong passphrase looks exactly
/// like a damaged file.
pub(crate) fn decode(data: &[u8], source: KeySource<'_>) -> Result<RawVault> {
    if data.len() < MIN_FILE_LEN {
        return Err(PwVaultError::format("file is shorter than the minimum size"));
    }
    if &data[..4] != MAGIC {
        return Err(PwVaultError::format("missing PWS3 magic"));
    }
    let eof_offset = data.len() - HMAC_LEN - EOF_MARKER.len();
    if &data[eof_offset..eof_offset + EOF_MARKER.len()] != EOF_MARKER {
        return Err(PwVaultError::format("missing PWS3-EOF marker"));
    }

    let salt = &data[SALT_OFFSET..ITER_OFFSET];
    let iterations = read_u32(data, ITER_OFFSET)?;

    let keys = match source {
        KeySource::Passphrase(passphrase) => {
            let stretched = stretch_key(passphrase, salt, iterations);
            if !stretched.verify(&data[CHECK_OFFSET..K_OFFSET]) {
                return Err(PwVaultError::format("passphrase check failed"));
            }
            DataKeys::new(
                stretched.unwrap_key(&data[K_OFFSET..L_OFFSET])?,
                stretched.unwrap_key(&data[L_OFFSET..IV_OFFSET])?,
            )
        }
        KeySource::Keys(keys) => DataKeys::new(*keys.cipher_key(), *keys.hmac_key()),
    };

    let mut iv = [0u8; BLOCK_LEN];
    iv.copy_from_slice(&data[IV_OFFSET..BODY_OFFSET]);

    let mut body = Zeroizing::new(data[BODY_OFFSET..eof_offset].to_vec());
    if body.len() % BLOCK_LEN != 0 {
        return Err(PwVaultError::format("body is not a whole number of blocks"));
    }
    cbc_decrypt(keys.cipher_key(), &iv, &mut body)
        .map_err(|_| PwVaultError::format("body decryption failed"))?;

    let mut mac = HmacSha256::new_from_slice(keys.hmac_key())
        .map_err(|e| PwVaultError::Crypto(format!("invalid HMAC key: {e}")))?;
    let mut reader = FieldReader::new(&body);

    let mut headers = Vec::new();
    while let Some((code, value)) = reader.next_field(&mut mac)? {
        if code == END_OF_ENTRY {
            break;
        }
        headers.push(Field::with_bytes(HeaderType::from_code(code), &value)?);
    }

    let mut entries = Vec::new();
    let mut current: Vec<Record> = Vec::new();
    while let Some((code, value)) = reader.next_field(&mut mac)? {
        if code == END_OF_ENTRY {
            if !current.is_empty() {
                entries.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(Field::with_bytes(RecordType::from_code(code), &value)?);
    }
    // A final group without its terminator still counts.
    if !current.is_empty() {
        entries.push(current);
    }

    mac.verify_slice(&data[data.len() - HMAC_LEN..])
        .map_err(|_| PwVaultError::format("HMAC mismatch"))?;

    match headers.first().map(|h| (h.kind(), h.version())) {
        Some((HeaderType::Version, Ok(Some(version)))) if version >= 0x0300 => {}
        Some((HeaderType::Version, Ok(Some(version)))) => {
            return Err(PwVaultError::UnsupportedVersion(version));
        }
        _ => return Err(PwVaultError::UnsupportedVersion(0)),
    }

    tracing::debug!(
        iterations,
        headers = headers.len(),
        entries = entries.len(),
        "decoded vault"
    );

    Ok(RawVault {
        iterations,
        headers,
        entries,
    })
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| PwVaultError::format("truncated length field"))?;
    Ok(u32::from_le_bytes(bytes))
}

/// Number of bytes a field of `len` data bytes takes on disk.
fn block_size(len: usize) -> usize {
    ((len + 4) / BLOCK_LEN + 1) * BLOCK_LEN
}

/// Walks the decrypted field stream.
struct FieldReader<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self { body, pos: 0 }
    }

    /// Next `(type, data)`, feeding the data into `mac`.
    fn next_field(&mut self, mac: &mut HmacSha256) -> Result<Option<(u8, Zeroizing<Vec<u8>>)>> {
        if self.pos >= self.body.len() {
            return Ok(None);
        }
        let len = read_u32(self.body, self.pos)? as usize;
        let size = block_size(len);
        if size > self.body.len() - self.pos {
            return Err(PwVaultError::format("field length runs past the body"));
        }

        let code = self.body[self.pos + 4];
        let start = self.pos + 5;
        let value = Zeroizing::new(self.body[start..start + len].to_vec());
        mac.update(&value);
        self.pos += size;
        Ok(Some((code, value)))
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encrypt a document into a complete file image.
///
/// `iterations` is raised to the minimum if needed. Fresh salt, IV and
/// padding are drawn on every call; K and L come from `keys`.
pub(crate) fn encode(
    headers: &[Header],
    entries: &[&[Record]],
    passphrase: &[u8],
    iterations: u32,
    keys: &DataKeys,
) -> Result<Vec<u8>> {
    let iterations = iterations.max(MIN_ITERATIONS);
    let salt = generate_salt();
    let stretched = stretch_key(passphrase, &salt, iterations);
    let iv: [u8; BLOCK_LEN] = random_bytes();

    let mut out = Vec::with_capacity(MIN_FILE_LEN + 64 * (headers.len() + entries.len()));
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iterations.to_le_bytes());
    out.extend_from_slice(&stretched.check_hash());
    out.extend_from_slice(&stretched.wrap(keys.cipher_key())?);
    out.extend_from_slice(&stretched.wrap(keys.hmac_key())?);
    out.extend_from_slice(&iv);

    let mut mac = HmacSha256::new_from_slice(keys.hmac_key())
        .map_err(|e| PwVaultError::Crypto(format!("invalid HMAC key: {e}")))?;
    let mut writer = FieldWriter {
        out: &mut out,
        mac: &mut mac,
        cipher: CbcEncryptor::new(keys.cipher_key(), &iv)?,
    };

    for header in headers {
        writer.write_field(header.kind().code(), &header.bytes()?)?;
    }
    writer.write_field(END_OF_ENTRY, &[])?;
    for records in entries {
        for record in records.iter() {
            writer.write_field(record.kind().code(), &record.bytes()?)?;
        }
        writer.write_field(END_OF_ENTRY, &[])?;
    }
    drop(writer);

    out.extend_from_slice(EOF_MARKER);
    out.extend_from_slice(&mac.finalize().into_bytes());

    tracing::debug!(
        iterations,
        headers = headers.len(),
        entries = entries.len(),
        bytes = out.len(),
        "encoded vault"
    );
    Ok(out)
}

struct FieldWriter<'a> {
    out: &'a mut Vec<u8>,
    mac: &'a mut HmacSha256,
    cipher: CbcEncryptor,
}

impl FieldWriter<'_> {
    fn write_field(&mut self, code: u8, value: &[u8]) -> Result<()> {
        let len = u32::try_from(value.len()).map_err(|_| {
            PwVaultError::SerializationError(format!(
                "field length {} exceeds u32::MAX",
                value.len()
            ))
        })?;
        self.mac.update(value);

        let mut block = Zeroizing::new(vec![0u8; block_size(value.len())]);
        rand::rng().fill_bytes(&mut block);
        block[..4].copy_from_slice(&len.to_le_bytes());
        block[4] = code;
        block[5..5 + value.len()].copy_from_slice(value);

        self.cipher.encrypt(&mut block)?;
        self.out.extend_from_slice(&block);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Write a vault file to disk **atomically**.
///
/// The bytes go to a temp file in the same directory which is then
/// renamed over the target, so readers never see a half-written file.
pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a whole vault file.
pub(crate) fn read_file(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    if !path.exists() {
        return Err(PwVaultError::VaultNotFound(path.to_path_buf()));
    }
    Ok(Zeroizing::new(fs::read(path)?))
}
