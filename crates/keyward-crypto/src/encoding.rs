//! Bech32 encoding with integrity checksums.
//!
//! Appends a 4-byte checksum (first 4 bytes of `SHA3-256(payload)`) to a
//! 32-byte payload, then encodes the 36 bytes as Bech32. Two prefixes are
//! in use: `kwd` for addresses and `kwsec` for secret seeds carried in
//! out-of-band key transfer. Decoding validates the prefix and the
//! embedded checksum, so a typo in a pasted string is caught before any
//! key material is acted on.

use bech32::{self, FromBase32, ToBase32, Variant};
use keyward_types::{Address, KeywardError, Result};
use zeroize::Zeroizing;

use crate::hash::sha3_256;

/// Human-readable prefix for Bech32-encoded addresses.
const HRP_ADDRESS: &str = "kwd";

/// Human-readable prefix for Bech32-encoded secret seeds.
const HRP_SECRET: &str = "kwsec";

/// Number of checksum bytes appended to the payload.
const CHECKSUM_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Address encoding
// ---------------------------------------------------------------------------

/// Encodes an address as a Bech32 string with the `kwd` prefix.
///
/// Example output: `kwd1qw508d6qejxtdg4y5r3zarvary0c5xw7k...`
pub fn encode_address(address: &Address) -> Result<String> {
    encode_payload(HRP_ADDRESS, address.as_bytes())
}

/// Decodes a Bech32 `kwd` string back into an [`Address`].
///
/// Validates the Bech32 encoding, checks the `kwd` prefix, and verifies
/// the embedded checksum.
///
/// # Errors
///
/// Returns [`KeywardError::InvalidAddress`] on any decode failure.
pub fn decode_address(s: &str) -> Result<Address> {
    let payload = decode_payload(HRP_ADDRESS, s).map_err(|e| KeywardError::InvalidAddress {
        reason: e.to_string(),
    })?;
    Ok(Address::new(*payload))
}

// ---------------------------------------------------------------------------
// Secret encoding
// ---------------------------------------------------------------------------

/// Encodes a 32-byte secret seed as a Bech32 string with the `kwsec`
/// prefix.
///
/// The output string contains live key material. Callers must treat it
/// with the same care as the raw seed.
pub fn encode_secret(seed: &[u8; 32]) -> Result<String> {
    encode_payload(HRP_SECRET, seed)
}

/// Decodes a Bech32 `kwsec` string back into a 32-byte secret seed.
///
/// The returned buffer zeroizes itself on drop.
///
/// # Errors
///
/// Returns [`KeywardError::WireFormat`] on any decode failure, including
/// a `kwd` string presented where a secret is expected.
pub fn decode_secret(s: &str) -> Result<Zeroizing<[u8; 32]>> {
    decode_payload(HRP_SECRET, s).map_err(|e| KeywardError::WireFormat {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

/// Appends the checksum and Bech32-encodes a 32-byte payload.
///
/// Checksum = `SHA3-256(payload)[0..4]`, giving 36 bytes total.
fn encode_payload(hrp: &str, payload: &[u8; 32]) -> Result<String> {
    let digest = sha3_256(payload);
    let mut data = [0u8; 36];
    data[..32].copy_from_slice(payload);
    data[32..].copy_from_slice(&digest[..CHECKSUM_LEN]);

    bech32::encode(hrp, data.to_base32(), Variant::Bech32).map_err(|e| {
        KeywardError::CryptoError {
            reason: format!("bech32 encoding failed: {e}"),
        }
    })
}

/// Decodes a Bech32 string, checks the prefix, and verifies the
/// embedded checksum.
///
/// Returns the 32-byte payload in a self-zeroizing buffer. Address
/// callers copy it out; secret callers keep the wrapper.
fn decode_payload(expected_hrp: &str, s: &str) -> Result<Zeroizing<[u8; 32]>> {
    let (hrp, data_base32, _variant) =
        bech32::decode(s).map_err(|e| KeywardError::CryptoError {
            reason: format!("bech32 decoding failed: {e}"),
        })?;

    if hrp != expected_hrp {
        return Err(KeywardError::CryptoError {
            reason: format!("expected HRP '{expected_hrp}', got '{hrp}'"),
        });
    }

    let bytes = Vec::<u8>::from_base32(&data_base32).map_err(|e| {
        KeywardError::CryptoError {
            reason: format!("bech32 base32 conversion failed: {e}"),
        }
    })?;

    if bytes.len() != 36 {
        return Err(KeywardError::CryptoError {
            reason: format!(
                "expected 36 bytes (32 payload + 4 checksum), got {}",
                bytes.len()
            ),
        });
    }

    let digest = sha3_256(&bytes[..32]);
    if bytes[32..] != digest[..CHECKSUM_LEN] {
        return Err(KeywardError::CryptoError {
            reason: "checksum mismatch".into(),
        });
    }

    let mut payload = Zeroizing::new([0u8; 32]);
    payload.copy_from_slice(&bytes[..32]);
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
