//! Factor-driven hardened key derivation.
//!
//! Rotation keys ratchet forward from a single master seed by repeated
//! application of a fixed four-level hardened derivation step. The four
//! child indices are computed from a user-held second factor:
//!
//! ```text
//! index(level) = SHA3-256(factor_utf8 || level_byte) mod (2^31 - 1)
//! ```
//!
//! The suffix depends only on the factor, so stepping is the whole
//! ratchet: `key[n+1] = step(key[n])`. Without the factor an attacker
//! holding the master seed cannot reproduce the index sequence.
//!
//! Master key and child derivation follow SLIP-0010 for Ed25519. Only
//! hardened derivation is used, as required by SLIP-0010 §3.
//!
//! Reference: <https://github.com/satoshilabs/slips/blob/master/slip-0010.md>

use hmac::{Hmac, Mac};
use keyward_types::{KeywardError, Result};
use sha2::Sha512;
use zeroize::Zeroize;

use crate::hash::sha3_256;
use crate::signing::Keypair;

/// HMAC-SHA512 type alias used throughout SLIP-0010.
type HmacSha512 = Hmac<Sha512>;

/// The hardened index offset (0x80000000) per BIP-32/SLIP-0010.
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// HMAC key for master key generation per SLIP-0010 §2.
const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";

/// Modulus for factor-driven child indices: 2^31 − 1.
const INDEX_MODULUS: u64 = 2_147_483_647;

/// Hardened levels applied per ratchet step.
const LEVELS_PER_STEP: u8 = 4;

// ---------------------------------------------------------------------------
// ExtendedKey
// ---------------------------------------------------------------------------

/// A derivation node: private key plus chain code.
///
/// Both halves are zeroized on drop. One node corresponds to one
/// position in the rotation sequence; [`step`](Self::step) produces the
/// next position.
pub struct ExtendedKey {
    key: [u8; 32],
    chain_code: [u8; 32],
}

// ExtendedKey does not implement Clone or Debug to prevent leakage.

impl Drop for ExtendedKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.chain_code.zeroize();
    }
}

impl ExtendedKey {
    /// Generates the master node from a raw seed.
    ///
    /// `I = HMAC-SHA512(key="ed25519 seed", data=seed)`
    /// `IL = I[0..32]` = master key, `IR = I[32..64]` = chain code.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::CryptoError`] if the seed is empty or
    /// HMAC computation fails.
    pub fn master_from_seed(seed: &[u8]) -> Result<Self> {
        if seed.is_empty() {
            return Err(KeywardError::CryptoError {
                reason: "derivation seed must not be empty".into(),
            });
        }

        let mut i = hmac_sha512(MASTER_HMAC_KEY, seed)?;

        let mut key = [0u8; 32];
        let mut chain_code = [0u8; 32];
        key.copy_from_slice(&i[..32]);
        chain_code.copy_from_slice(&i[32..]);
        i.zeroize();

        Ok(Self { key, chain_code })
    }

    /// Applies one ratchet step: four hardened derivations with
    /// factor-driven indices.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::CryptoError`] if HMAC computation fails.
    pub fn step(&self, factor: &str) -> Result<ExtendedKey> {
        let mut key = self.key;
        let mut chain_code = self.chain_code;

        for level in 0..LEVELS_PER_STEP {
            let index = derive_index(factor, level);
            let (child_key, child_chain) = derive_hardened_child(&key, &chain_code, index)?;
            key.zeroize();
            chain_code.zeroize();
            key = child_key;
            chain_code = child_chain;
        }

        Ok(ExtendedKey { key, chain_code })
    }

    /// Returns the Ed25519 keypair at this node.
    pub fn keypair(&self) -> Keypair {
        Keypair::from_seed(&self.key)
    }
}

// ---------------------------------------------------------------------------
// Index computation
// ---------------------------------------------------------------------------

/// Computes the hardened child index for one derivation level.
///
/// The SHA3-256 digest of `factor_utf8 || level_byte` is interpreted as
/// a big-endian 256-bit integer and reduced modulo 2^31 − 1. The
/// reduction is done byte-by-byte so no big-integer arithmetic is
/// needed: `acc = (acc * 256 + byte) mod m` never exceeds 2^39.
pub fn derive_index(factor: &str, level: u8) -> u32 {
    let mut preimage = Vec::with_capacity(factor.len() + 1);
    preimage.extend_from_slice(factor.as_bytes());
    preimage.push(level);
    let digest = sha3_256(&preimage);

    let mut acc: u64 = 0;
    for byte in digest {
        acc = (acc * 256 + u64::from(byte)) % INDEX_MODULUS;
    }
    acc as u32
}

// ---------------------------------------------------------------------------
// Internal: child derivation
// ---------------------------------------------------------------------------

/// Derives a hardened child key from a parent key and chain code.
///
/// `I = HMAC-SHA512(key=chain_code, data=0x00 || parent_key || ser32(index | 0x80000000))`
/// `IL = I[0..32]` = child key, `IR = I[32..64]` = child chain code.
fn derive_hardened_child(
    parent_key: &[u8; 32],
    parent_chain_code: &[u8; 32],
    index: u32,
) -> Result<([u8; 32], [u8; 32])> {
    // data = 0x00 || parent_key (32 bytes) || index_be (4 bytes) = 37 bytes
    let mut data = [0u8; 37];
    data[0] = 0x00;
    data[1..33].copy_from_slice(parent_key);
    data[33..37].copy_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());

    let i = hmac_sha512(parent_chain_code, &data)?;
    data.zeroize();

    let mut child_key = [0u8; 32];
    let mut child_chain = [0u8; 32];
    child_key.copy_from_slice(&i[..32]);
    child_chain.copy_from_slice(&i[32..]);

    Ok((child_key, child_chain))
}

/// Computes HMAC-SHA512 and returns the 64-byte output.
fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|e| {
        KeywardError::CryptoError {
            reason: format!("HMAC-SHA512 key init failed: {e}"),
        }
    })?;
    mac.update(data);
    let result = mac.finalize().into_bytes();

    let mut output = [0u8; 64];
    output.copy_from_slice(&result);
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- SLIP-0010 test vector 1 ---
    //
    // Seed (hex): 000102030405060708090a0b0c0d0e0f
    // From: https://github.com/satoshilabs/slips/blob/master/slip-0010.md
    //
    // Chain m:
    //   private: 2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7
    //   chain:   90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb

    #[test]
    fn slip0010_master_key_vector1() -> std::result::Result<(), KeywardError> {
        let seed = hex_to_bytes("000102030405060708090a0b0c0d0e0f");
        let node = ExtendedKey::master_from_seed(&seed)?;

        assert_eq!(
            to_hex(&node.key),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            to_hex(&node.chain_code),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
        Ok(())
    }

    // Chain m/0':
    //   private: 68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3
    //   chain:   8b59aa11380b624e81507a27fedda59fea6d0b779a778918a2fd3590e16e9c69
    #[test]
    fn slip0010_child_m0h_vector1() -> std::result::Result<(), KeywardError> {
        let seed = hex_to_bytes("000102030405060708090a0b0c0d0e0f");
        let node = ExtendedKey::master_from_seed(&seed)?;
        let (child_key, child_chain) =
            derive_hardened_child(&node.key, &node.chain_code, 0)?;

        assert_eq!(
            to_hex(&child_key),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
        assert_eq!(
            to_hex(&child_chain),
            "8b59aa11380b624e81507a27fedda59fea6d0b779a778918a2fd3590e16e9c69"
        );
        Ok(())
    }

    // --- Index computation ---

    #[test]
    fn derive_index_is_deterministic() {
        assert_eq!(derive_index("factor", 0), derive_index("factor", 0));
    }

    #[test]
    fn derive_index_within_hardened_range() {
        for factor in ["", "a", "second factor", "密码"] {
            for level in 0..LEVELS_PER_STEP {
                let index = derive_index(factor, level);
                assert!(u64::from(index) < INDEX_MODULUS);
            }
        }
    }

    #[test]
    fn derive_index_varies_with_level_and_factor() {
        let base = derive_index("factor", 0);
        assert_ne!(base, derive_index("factor", 1));
        assert_ne!(base, derive_index("rotcaf", 0));
    }

    // --- Ratchet behaviour ---

    #[test]
    fn step_is_deterministic() -> std::result::Result<(), KeywardError> {
        let seed = [0x42u8; 64];
        let kp1 = ExtendedKey::master_from_seed(&seed)?.step("mfa")?.keypair();
        let kp2 = ExtendedKey::master_from_seed(&seed)?.step("mfa")?.keypair();
        assert_eq!(kp1.public_key(), kp2.public_key());
        Ok(())
    }

    #[test]
    fn successive_steps_produce_distinct_keys() -> std::result::Result<(), KeywardError> {
        let master = ExtendedKey::master_from_seed(&[0x42u8; 64])?;
        let first = master.step("mfa")?;
        let second = first.step("mfa")?;
        let third = second.step("mfa")?;

        let a1 = first.keypair().address();
        let a2 = second.keypair().address();
        let a3 = third.keypair().address();
        assert_ne!(a1, a2);
        assert_ne!(a2, a3);
        assert_ne!(a1, a3);
        Ok(())
    }

    #[test]
    fn different_factors_diverge() -> std::result::Result<(), KeywardError> {
        let master_a = ExtendedKey::master_from_seed(&[0x42u8; 64])?;
        let master_b = ExtendedKey::master_from_seed(&[0x42u8; 64])?;
        let kp_a = master_a.step("factor one")?.keypair();
        let kp_b = master_b.step("factor two")?.keypair();
        assert_ne!(kp_a.address(), kp_b.address());
        Ok(())
    }

    #[test]
    fn empty_seed_rejected() {
        assert!(ExtendedKey::master_from_seed(&[]).is_err());
    }

    // --- Test utilities ---

    fn hex_to_bytes(hex: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(hex.len() / 2);
        let mut i = 0;
        let chars: Vec<char> = hex.chars().collect();
        while i < chars.len() {
            let high = chars[i].to_digit(16).unwrap_or(0) as u8;
            let low = chars[i + 1].to_digit(16).unwrap_or(0) as u8;
            bytes.push((high << 4) | low);
            i += 2;
        }
        bytes
    }

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
