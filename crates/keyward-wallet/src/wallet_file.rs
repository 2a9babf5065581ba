//! Binary seed file format: header validation, read, and write.
//!
//! # File layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       4   Magic bytes: b"KWRD"
//!   4       1   Version: 0x01
//!   5     100   Header body (bincode-serialized):
//!                 params      : Argon2Params (3 × u32, 12B)
//!                 salt        : [u8; 32]
//!                 nonce       : [u8; 24]
//!                 fingerprint : [u8; 32]
//! 105      80   Encrypted seed (XChaCha20-Poly1305 ciphertext + tag)
//! ```
//!
//! The seed is a fixed 64 bytes, so the payload is always exactly
//! 64 + 16 = 80 bytes; any other length is rejected as corruption.
//! Magic and version are verified **before** any deserialization to
//! prevent feeding malformed data to bincode.

use keyward_crypto::kdf::Argon2Params;
use keyward_types::{KeywardError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::wallet::SEED_LEN;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes identifying a Keyward seed file.
pub const SEED_FILE_MAGIC: [u8; 4] = *b"KWRD";

/// Current seed file format version.
pub const SEED_FILE_VERSION: u8 = 1;

/// Bincode-serialized size of [`HeaderBody`]:
/// 3 × u32 (12) + [u8; 32] (32) + [u8; 24] (24) + [u8; 32] (32) = 100.
const HEADER_BODY_SIZE: usize = 12 + 32 + 24 + 32;

/// Total header size: magic (4) + version (1) + body (100) = 105.
const TOTAL_HEADER_SIZE: usize = 4 + 1 + HEADER_BODY_SIZE;

/// Exact encrypted payload size: 64-byte seed + 16-byte Poly1305 tag.
const PAYLOAD_SIZE: usize = SEED_LEN + 16;

// ---------------------------------------------------------------------------
// SeedFileHeader
// ---------------------------------------------------------------------------

/// Parsed header of a Keyward seed file.
///
/// Represents the validated, in-memory form of the file header. The
/// magic and version fields are constants and are verified during
/// [`read_seed_file`] rather than stored in this struct.
pub struct SeedFileHeader {
    /// Argon2id parameters used for key derivation.
    pub argon2_params: Argon2Params,
    /// 32-byte random salt for Argon2id.
    pub salt: [u8; 32],
    /// 24-byte nonce for XChaCha20-Poly1305.
    pub nonce: [u8; 24],
    /// SHA3-256 fingerprint of the plaintext seed.
    pub fingerprint: [u8; 32],
}

/// Internal bincode-serializable representation of the header body.
#[derive(Serialize, Deserialize)]
struct HeaderBody {
    params: Argon2Params,
    salt: [u8; 32],
    nonce: [u8; 24],
    fingerprint: [u8; 32],
}

impl From<&SeedFileHeader> for HeaderBody {
    fn from(h: &SeedFileHeader) -> Self {
        Self {
            params: h.argon2_params,
            salt: h.salt,
            nonce: h.nonce,
            fingerprint: h.fingerprint,
        }
    }
}

impl HeaderBody {
    /// Converts to the public [`SeedFileHeader`].
    fn into_header(self) -> SeedFileHeader {
        SeedFileHeader {
            argon2_params: self.params,
            salt: self.salt,
            nonce: self.nonce,
            fingerprint: self.fingerprint,
        }
    }
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Writes a seed file to disk.
///
/// # File structure
///
/// 1. Magic bytes `b"KWRD"` (4 bytes).
/// 2. Version byte `0x01` (1 byte).
/// 3. Header body serialized via `bincode` (100 bytes).
/// 4. Encrypted seed payload (80 bytes).
///
/// # Errors
///
/// - [`KeywardError::StorageError`] if the payload length is wrong or
///   the file cannot be written.
pub fn write_seed_file(
    path: &Path,
    header: &SeedFileHeader,
    encrypted_payload: &[u8],
) -> Result<()> {
    if encrypted_payload.len() != PAYLOAD_SIZE {
        return Err(KeywardError::StorageError {
            reason: format!(
                "encrypted seed payload must be {PAYLOAD_SIZE} bytes, got {}",
                encrypted_payload.len()
            ),
        });
    }

    let body = HeaderBody::from(header);
    let body_bytes = bincode::serialize(&body).map_err(|e| KeywardError::StorageError {
        reason: format!("failed to serialize seed file header: {e}"),
    })?;

    let mut data = Vec::with_capacity(TOTAL_HEADER_SIZE + encrypted_payload.len());
    data.extend_from_slice(&SEED_FILE_MAGIC);
    data.push(SEED_FILE_VERSION);
    data.extend_from_slice(&body_bytes);
    data.extend_from_slice(encrypted_payload);

    std::fs::write(path, &data).map_err(|e| KeywardError::StorageError {
        reason: format!("failed to write seed file: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Reads and validates a seed file from disk.
///
/// # Validation order
///
/// 1. File size is exactly header + payload.
/// 2. Magic bytes match `b"KWRD"`.
/// 3. Version byte matches current version (`0x01`).
/// 4. Header body deserialized via `bincode`.
///
/// # Returns
///
/// A tuple of the validated [`SeedFileHeader`] and the raw encrypted
/// payload bytes.
///
/// # Errors
///
/// - [`KeywardError::StorageError`] for I/O failures, wrong file size,
///   magic mismatch, or version mismatch.
pub fn read_seed_file(path: &Path) -> Result<(SeedFileHeader, Vec<u8>)> {
    let data = std::fs::read(path).map_err(|e| KeywardError::StorageError {
        reason: format!("failed to read seed file: {e}"),
    })?;

    // 1. Exact size check (fixed-width format).
    let expected_size = TOTAL_HEADER_SIZE + PAYLOAD_SIZE;
    if data.len() != expected_size {
        return Err(KeywardError::StorageError {
            reason: format!(
                "seed file size mismatch: expected {expected_size} bytes, got {}",
                data.len()
            ),
        });
    }

    // 2. Magic bytes.
    let magic = &data[0..4];
    if magic != SEED_FILE_MAGIC {
        return Err(KeywardError::StorageError {
            reason: format!(
                "seed file magic mismatch: expected {:?}, got {:?}",
                &SEED_FILE_MAGIC, magic
            ),
        });
    }

    // 3. Version byte.
    let version = data[4];
    if version != SEED_FILE_VERSION {
        return Err(KeywardError::StorageError {
            reason: format!(
                "seed file version mismatch: expected {SEED_FILE_VERSION}, got {version}"
            ),
        });
    }

    // 4. Deserialize header body.
    let body_slice = &data[5..5 + HEADER_BODY_SIZE];
    let body: HeaderBody =
        bincode::deserialize(body_slice).map_err(|e| KeywardError::StorageError {
            reason: format!("failed to deserialize seed file header: {e}"),
        })?;

    let payload = data[TOTAL_HEADER_SIZE..].to_vec();
    Ok((body.into_header(), payload))
}
