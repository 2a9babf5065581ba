//! Rotation bundle assembly: the dual-transaction unit that retires
//! one key and seats its successor.
//!
//! A bundle pairs two signed transactions submitted atomically:
//!
//! * the **unconfirmed** side, signed by the outgoing key, carrying the
//!   outgoing key's commitments, any third-party value, and the permit
//!   batch;
//! * the **confirming** side, signed by the successor at the next
//!   nonce, carrying the successor's commitments and zero value.
//!
//! Both sides sign the same message shape:
//!
//! ```text
//! message = b"KWD:rotate:v1:" || asset(32) || amount_be(16)
//!           || output_address(32) || nonce_be(8)
//! ```
//!
//! The output address is the appended entry's own prerotated
//! commitment: the successor's address at inception, the successor's
//! prerotated hash on every later rotation. Residual native value
//! lands there, one hop ahead of the key that signs next.

use keyward_crypto::signing::{self, Keypair, PublicKey, Signature};
use keyward_types::{
    Address, Amount, AssetId, CandidateKey, KeyLogEntry, KeywardError, Result, Signable,
};
use serde::{Deserialize, Serialize};

use crate::permit::Permit;

/// Domain-separation prefix for rotation signing messages.
const ROTATION_PREFIX: &[u8] = b"KWD:rotate:v1:";

// ---------------------------------------------------------------------------
// RotationMessage
// ---------------------------------------------------------------------------

/// The structured message a rotation signature covers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RotationMessage {
    /// The asset the transaction settles in.
    pub asset: AssetId,
    /// Value carried by the transaction.
    pub amount: Amount,
    /// Where residual value lands.
    pub output_address: Address,
    /// The signer's ledger nonce for this transaction.
    pub nonce: u64,
}

impl Signable for RotationMessage {
    fn signable_bytes(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(ROTATION_PREFIX.len() + 32 + 16 + 32 + 8);
        msg.extend_from_slice(ROTATION_PREFIX);
        msg.extend_from_slice(self.asset.as_ref());
        msg.extend_from_slice(&self.amount.to_be_bytes());
        msg.extend_from_slice(self.output_address.as_ref());
        msg.extend_from_slice(&self.nonce.to_be_bytes());
        msg
    }
}

// ---------------------------------------------------------------------------
// BundleSide
// ---------------------------------------------------------------------------

/// One signed half of a rotation bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleSide {
    /// Value carried: the recipient sum on the unconfirmed side, zero
    /// on the confirming side.
    pub amount: Amount,
    /// Signature over the side's [`RotationMessage`].
    pub signature: Signature,
    /// Public key of the signer.
    pub public_key: PublicKey,
    /// The signer's prerotated commitment.
    pub prerotated_key_hash: Address,
    /// The signer's twice-prerotated commitment.
    pub twice_prerotated_key_hash: Address,
    /// Hash of the signer's predecessor, `None` only at inception.
    pub prev_public_key_hash: Option<Address>,
    /// Where residual value lands; identical on both sides.
    pub output_address: Address,
    /// Whether this key is bound to an external relationship.
    pub has_relationship: bool,
    /// Permits riding along; always empty on the confirming side.
    pub permits: Vec<Permit>,
}

impl BundleSide {
    /// Address of the signing key.
    pub fn address(&self) -> Address {
        signing::pubkey_to_address(&self.public_key)
    }

    /// This side's claims at the given rotation number, for continuity
    /// checks.
    pub fn candidate(&self, rotation: u64) -> CandidateKey {
        CandidateKey {
            address: self.address(),
            prerotated_key_hash: self.prerotated_key_hash,
            twice_prerotated_key_hash: self.twice_prerotated_key_hash,
            prev_public_key_hash: self.prev_public_key_hash,
            rotation,
        }
    }

    /// The log entry this side produces once accepted.
    pub fn log_entry(&self, rotation: u64, on_chain: bool) -> KeyLogEntry {
        KeyLogEntry {
            public_key_hash: self.address(),
            prerotated_key_hash: self.prerotated_key_hash,
            twice_prerotated_key_hash: self.twice_prerotated_key_hash,
            prev_public_key_hash: self.prev_public_key_hash,
            output_address: self.output_address,
            has_relationship: self.has_relationship,
            on_chain,
            rotation,
        }
    }

    /// Verifies this side's signature at the given nonce.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::CryptoError`] if the signature does not
    /// match the reconstructed message.
    pub fn verify_signature(&self, asset: AssetId, nonce: u64) -> Result<()> {
        let message = RotationMessage {
            asset,
            amount: self.amount,
            output_address: self.output_address,
            nonce,
        };
        signing::verify(&self.public_key, &message.signable_bytes(), &self.signature)
    }
}

// ---------------------------------------------------------------------------
// RotationBundle
// ---------------------------------------------------------------------------

/// The atomic dual-transaction unit a rotation submits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationBundle {
    /// The asset both sides settle in.
    pub asset: AssetId,
    /// Transaction signed by the outgoing key at `nonce`.
    pub unconfirmed: BundleSide,
    /// Transaction signed by the successor at `nonce + 1`.
    pub confirming: BundleSide,
    /// The outgoing signer's nonce; the confirming side consumes the
    /// one after it.
    pub nonce: u64,
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Everything assembly needs, gathered by the caller up front.
pub struct BundleRequest<'a> {
    /// The key being retired.
    pub current: &'a Keypair,
    /// The retiring key's commitments.
    pub current_claims: &'a CandidateKey,
    /// The successor key.
    pub next: &'a Keypair,
    /// The successor's commitments.
    pub next_claims: &'a CandidateKey,
    /// The asset the bundle settles in.
    pub asset: AssetId,
    /// Sum of third-party payments carried on the unconfirmed side.
    pub value: Amount,
    /// Permits redirecting asset balances to the successor's span.
    pub permits: Vec<Permit>,
    /// The retiring signer's current ledger nonce.
    pub nonce: u64,
    /// Whether this bundle seeds an empty log.
    pub inception: bool,
}

/// Where a rotation's residual value lands.
///
/// The ledger credits the leftover to the appended entry's own
/// prerotated commitment. A founding bundle appends the retiring key's
/// entry, whose commitment is the successor's address; every later
/// bundle appends the successor's entry, whose commitment is the
/// successor's own prerotated hash.
pub fn rotation_output(next_claims: &CandidateKey, inception: bool) -> Address {
    if inception {
        next_claims.address
    } else {
        next_claims.prerotated_key_hash
    }
}

/// Assembles a rotation bundle, signing both sides.
///
/// # Process
///
/// The output address is chosen from the successor's claims, then both
/// transactions are built and signed: the unconfirmed side by the
/// retiring key at the base nonce, the confirming side by the
/// successor at the nonce after it with zero value. The confirming
/// signature is checked locally so a mismatched successor key is
/// caught before anything reaches the ledger.
///
/// # Errors
///
/// * [`KeywardError::InvalidAddress`] if the chosen output address is
///   the zero address.
/// * [`KeywardError::KeyMismatch`] if the successor keypair does not
///   hash to the successor claims' address, or its signature fails
///   verification.
pub fn build(request: BundleRequest<'_>) -> Result<RotationBundle> {
    let output_address = rotation_output(request.next_claims, request.inception);

    if output_address.is_zero() {
        return Err(KeywardError::InvalidAddress {
            reason: "rotation output address is the zero address".to_string(),
        });
    }

    if request.next.address() != request.next_claims.address {
        return Err(KeywardError::KeyMismatch {
            reason: format!(
                "successor keypair hashes to {} but claims assert {}",
                request.next.address(),
                request.next_claims.address
            ),
        });
    }

    let unconfirmed_message = RotationMessage {
        asset: request.asset,
        amount: request.value,
        output_address,
        nonce: request.nonce,
    };
    let confirming_message = RotationMessage {
        asset: request.asset,
        amount: 0,
        output_address,
        nonce: request.nonce + 1,
    };

    let unconfirmed = BundleSide {
        amount: request.value,
        signature: request.current.sign(&unconfirmed_message.signable_bytes()),
        public_key: request.current.public_key(),
        prerotated_key_hash: request.current_claims.prerotated_key_hash,
        twice_prerotated_key_hash: request.current_claims.twice_prerotated_key_hash,
        prev_public_key_hash: request.current_claims.prev_public_key_hash,
        output_address,
        has_relationship: false,
        permits: request.permits,
    };

    let confirming = BundleSide {
        amount: 0,
        signature: request.next.sign(&confirming_message.signable_bytes()),
        public_key: request.next.public_key(),
        prerotated_key_hash: request.next_claims.prerotated_key_hash,
        twice_prerotated_key_hash: request.next_claims.twice_prerotated_key_hash,
        prev_public_key_hash: request.next_claims.prev_public_key_hash,
        output_address,
        has_relationship: false,
        permits: Vec::new(),
    };

    confirming
        .verify_signature(request.asset, request.nonce + 1)
        .map_err(|_| KeywardError::KeyMismatch {
            reason: "confirming signature failed local verification".to_string(),
        })?;

    Ok(RotationBundle {
        asset: request.asset,
        unconfirmed,
        confirming,
        nonce: request.nonce,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
