//! Out-of-band key transfer wire format.
//!
//! A key travels between devices (QR code, paste buffer) as a single
//! pipe-delimited line of five fields:
//!
//! ```text
//! secret|prerotated_key_hash|twice_prerotated_key_hash|prev_public_key_hash|rotation
//! ```
//!
//! The secret is Bech32 `kwsec`, the addresses are Bech32 `kwd`, the
//! predecessor field is empty for an inception key, and the rotation
//! index is a non-negative decimal integer. Every field is validated
//! before any key material is acted on.

use keyward_crypto::encoding::{decode_address, decode_secret, encode_address, encode_secret};
use keyward_crypto::signing::Keypair;
use keyward_types::{Address, CandidateKey, KeywardError, Result};
use zeroize::Zeroize;

/// Number of pipe-delimited fields in the wire format.
const FIELD_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// ScannedKey
// ---------------------------------------------------------------------------

/// A key reconstructed from wire data: the keypair plus its continuity
/// claims.
///
/// The claimed address is always derived from the decoded secret, never
/// read from the wire, so the claims cannot disagree with the key
/// material.
pub struct ScannedKey {
    /// The reconstructed signing keypair.
    pub keypair: Keypair,
    /// The key's claims about its place in the chain.
    pub claims: CandidateKey,
}

// ScannedKey does not implement Clone or Debug; it holds live key
// material via the keypair.

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses a wire-format line into a [`ScannedKey`].
///
/// # Errors
///
/// - [`KeywardError::WireFormat`] if the field count, secret encoding,
///   or rotation index is malformed.
/// - [`KeywardError::InvalidAddress`] if any address field fails
///   Bech32 or checksum validation.
pub fn parse_wire(line: &str) -> Result<ScannedKey> {
    let fields: Vec<&str> = line.trim().split('|').collect();
    if fields.len() != FIELD_COUNT {
        return Err(KeywardError::WireFormat {
            reason: format!(
                "expected {FIELD_COUNT} pipe-delimited fields, got {}",
                fields.len()
            ),
        });
    }

    let seed = decode_secret(fields[0])?;
    let keypair = Keypair::from_seed(&seed);

    let prerotated_key_hash = decode_address(fields[1])?;
    let twice_prerotated_key_hash = decode_address(fields[2])?;

    let prev_public_key_hash: Option<Address> = if fields[3].is_empty() {
        None
    } else {
        Some(decode_address(fields[3])?)
    };

    let rotation: u64 = fields[4].parse().map_err(|_| KeywardError::WireFormat {
        reason: format!("rotation index '{}' is not a non-negative integer", fields[4]),
    })?;

    let claims = CandidateKey {
        address: keypair.address(),
        prerotated_key_hash,
        twice_prerotated_key_hash,
        prev_public_key_hash,
        rotation,
    };

    Ok(ScannedKey { keypair, claims })
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a keypair and its claims as a wire-format line.
///
/// The output contains the live secret seed; treat the string with the
/// same care as the key itself.
pub fn encode_wire(keypair: &Keypair, claims: &CandidateKey) -> Result<String> {
    let mut seed = keypair.seed_bytes();
    let secret = encode_secret(&seed);
    seed.zeroize();
    let secret = secret?;

    let prev = match claims.prev_public_key_hash {
        Some(addr) => encode_address(&addr)?,
        None => String::new(),
    };

    Ok(format!(
        "{}|{}|{}|{}|{}",
        secret,
        encode_address(&claims.prerotated_key_hash)?,
        encode_address(&claims.twice_prerotated_key_hash)?,
        prev,
        claims.rotation
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims(keypair: &Keypair, prev: Option<Address>, rotation: u64) -> CandidateKey {
        CandidateKey {
            address: keypair.address(),
            prerotated_key_hash: Address::new([0x0B; 32]),
            twice_prerotated_key_hash: Address::new([0x0C; 32]),
            prev_public_key_hash: prev,
            rotation,
        }
    }

    #[test]
    fn roundtrip_with_predecessor() -> std::result::Result<(), KeywardError> {
        let keypair = Keypair::from_seed(&[0x42u8; 32]);
        let claims = sample_claims(&keypair, Some(Address::new([0x0A; 32])), 3);

        let line = encode_wire(&keypair, &claims)?;
        let scanned = parse_wire(&line)?;

        assert_eq!(scanned.claims, claims);
        assert_eq!(scanned.keypair.address(), keypair.address());
        Ok(())
    }

    #[test]
    fn roundtrip_inception_key() -> std::result::Result<(), KeywardError> {
        let keypair = Keypair::from_seed(&[0x42u8; 32]);
        let claims = sample_claims(&keypair, None, 0);

        let line = encode_wire(&keypair, &claims)?;
        let scanned = parse_wire(&line)?;

        assert_eq!(scanned.claims.prev_public_key_hash, None);
        assert_eq!(scanned.claims.rotation, 0);
        Ok(())
    }

    #[test]
    fn address_is_derived_not_trusted() -> std::result::Result<(), KeywardError> {
        let keypair = Keypair::from_seed(&[0x42u8; 32]);
        let claims = sample_claims(&keypair, None, 0);
        let line = encode_wire(&keypair, &claims)?;

        let scanned = parse_wire(&line)?;
        assert_eq!(scanned.claims.address, keypair.address());
        Ok(())
    }

    #[test]
    fn wrong_field_count_rejected() {
        let result = parse_wire("a|b|c|d");
        assert!(matches!(result, Err(KeywardError::WireFormat { .. })));

        let result = parse_wire("a|b|c|d|e|f");
        assert!(matches!(result, Err(KeywardError::WireFormat { .. })));
    }

    #[test]
    fn malformed_secret_rejected() -> std::result::Result<(), KeywardError> {
        let addr = encode_address(&Address::new([0x0B; 32]))?;
        let line = format!("notasecret|{addr}|{addr}||0");
        assert!(matches!(
            parse_wire(&line),
            Err(KeywardError::WireFormat { .. })
        ));
        Ok(())
    }

    #[test]
    fn malformed_address_rejected() -> std::result::Result<(), KeywardError> {
        let seed = [0x42u8; 32];
        let secret = encode_secret(&seed)?;
        let addr = encode_address(&Address::new([0x0B; 32]))?;
        let line = format!("{secret}|garbage|{addr}||0");
        assert!(matches!(
            parse_wire(&line),
            Err(KeywardError::InvalidAddress { .. })
        ));
        Ok(())
    }

    #[test]
    fn malformed_rotation_rejected() -> std::result::Result<(), KeywardError> {
        let keypair = Keypair::from_seed(&[0x42u8; 32]);
        let claims = sample_claims(&keypair, None, 0);
        let line = encode_wire(&keypair, &claims)?;
        let tampered = line.rsplit_once('|').map(|(head, _)| format!("{head}|-1"));

        if let Some(tampered) = tampered {
            assert!(matches!(
                parse_wire(&tampered),
                Err(KeywardError::WireFormat { .. })
            ));
        }
        Ok(())
    }

    #[test]
    fn surrounding_whitespace_tolerated() -> std::result::Result<(), KeywardError> {
        let keypair = Keypair::from_seed(&[0x42u8; 32]);
        let claims = sample_claims(&keypair, None, 0);
        let line = format!("  {}\n", encode_wire(&keypair, &claims)?);

        let scanned = parse_wire(&line)?;
        assert_eq!(scanned.claims, claims);
        Ok(())
    }
}
