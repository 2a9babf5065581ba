//! SHA3-256 hashing.
//!
//! All hashing in Keyward uses SHA3-256 (Keccak): address derivation,
//! rotation digests, checksums, and derivation-index computation all
//! reduce to this one primitive.

use sha3::{Digest, Sha3_256};

/// Computes the SHA3-256 hash of arbitrary data.
///
/// Returns a fixed 32-byte digest. Deterministic: identical inputs
/// always produce identical outputs.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
