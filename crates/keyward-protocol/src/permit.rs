//! Permit aggregation: signed transfer authorizations for fungible
//! assets.
//!
//! When a key rotates, every asset balance it holds must follow it to
//! the successor. Each non-native asset gets a time-boxed permit signed
//! by the outgoing key:
//!
//! ```text
//! message = b"KWD:permit:v1:" || asset(32) || owner(32) || spender(32)
//!           || value_be(16) || nonce_be(8) || deadline_be(8)
//! signature = Ed25519.sign(holder, message)
//! ```
//!
//! The native asset never appears here; it moves via the rotation
//! transaction's own value field.

use std::collections::BTreeMap;

use keyward_crypto::signing::{self, Keypair, PublicKey, Signature};
use keyward_types::{
    Address, Amount, AssetId, KeywardError, Result, Signable, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Domain-separation prefix for permit signing messages.
const PERMIT_PREFIX: &[u8] = b"KWD:permit:v1:";

// ---------------------------------------------------------------------------
// AssetHandle
// ---------------------------------------------------------------------------

/// Pre-fetched snapshot of one asset position held by the rotating key.
///
/// The coordinator reads these from the ledger before aggregation so
/// that permit collection itself stays pure.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AssetHandle {
    /// The asset in question.
    pub asset: AssetId,
    /// The holder's balance at snapshot time.
    pub balance: Amount,
    /// The holder's current permit signing nonce for this asset.
    pub permit_nonce: u64,
    /// Whether the asset supports permit signing at all.
    pub supports_permits: bool,
}

// ---------------------------------------------------------------------------
// PermitMessage
// ---------------------------------------------------------------------------

/// The structured message a permit signature covers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermitMessage {
    /// The asset being authorized.
    pub asset: AssetId,
    /// Address of the balance holder (the signer).
    pub owner: Address,
    /// Address authorized to move the balance.
    pub spender: Address,
    /// Exact amount authorized. The signature binds this value.
    pub value: Amount,
    /// The owner's permit nonce for this asset; enforces single use.
    pub nonce: u64,
    /// Unix-seconds expiry.
    pub deadline: u64,
}

impl Signable for PermitMessage {
    fn signable_bytes(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(PERMIT_PREFIX.len() + 32 + 32 + 32 + 16 + 8 + 8);
        msg.extend_from_slice(PERMIT_PREFIX);
        msg.extend_from_slice(self.asset.as_ref());
        msg.extend_from_slice(self.owner.as_ref());
        msg.extend_from_slice(self.spender.as_ref());
        msg.extend_from_slice(&self.value.to_be_bytes());
        msg.extend_from_slice(&self.nonce.to_be_bytes());
        msg.extend_from_slice(&self.deadline.to_be_bytes());
        msg
    }
}

// ---------------------------------------------------------------------------
// Permit
// ---------------------------------------------------------------------------

/// A signed, time-boxed authorization to move one asset balance.
///
/// Single-use: the ledger reconstructs the signed message with its own
/// stored nonce, so a permit replayed after the nonce advances fails
/// verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Permit {
    /// The asset being moved.
    pub asset: AssetId,
    /// Exact amount the signature binds.
    pub amount: Amount,
    /// Unix-seconds expiry.
    pub deadline: u64,
    /// Ed25519 signature by the owner over the permit message.
    pub signature: Signature,
    /// Public key of the signing owner.
    pub owner_public_key: PublicKey,
    /// Address the balance is redirected to.
    pub recipient: Address,
}

impl Permit {
    /// Address of the balance holder, derived from the signing key.
    pub fn owner(&self) -> Address {
        signing::pubkey_to_address(&self.owner_public_key)
    }

    /// Verifies this permit's signature against a spender and the
    /// owner's expected nonce.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::CryptoError`] if the signature does not
    /// match the reconstructed message.
    pub fn verify(&self, spender: Address, expected_nonce: u64) -> Result<()> {
        let message = PermitMessage {
            asset: self.asset,
            owner: self.owner(),
            spender,
            value: self.amount,
            nonce: expected_nonce,
            deadline: self.deadline,
        };
        signing::verify(
            &self.owner_public_key,
            &message.signable_bytes(),
            &self.signature,
        )
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Permits produced by one aggregation pass, plus the assets that had
/// to be left behind.
#[derive(Debug, Default)]
pub struct PermitBatch {
    /// Signed permits, one per movable asset balance.
    pub permits: Vec<Permit>,
    /// Assets holding a balance but lacking permit support. Their
    /// balances do not move automatically and must be swept separately.
    pub skipped: Vec<AssetId>,
}

/// Aggregates permits redirecting every movable asset balance to the
/// recipient.
///
/// # Process
///
/// For each handle: the native asset is excluded outright; any amount
/// simultaneously being paid to third parties (`adjustments`) is
/// subtracted before signing, since the signature binds the exact
/// amount; zero net balances produce nothing; assets without permit
/// support are recorded in [`PermitBatch::skipped`] rather than
/// failing the rotation.
///
/// # Errors
///
/// Returns [`KeywardError::InsufficientBalance`] if an adjustment
/// exceeds the snapshot balance.
pub fn collect_permits(
    handles: &[AssetHandle],
    holder: &Keypair,
    spender: Address,
    recipient: Address,
    deadline_window_secs: u64,
    adjustments: &BTreeMap<AssetId, Amount>,
) -> Result<PermitBatch> {
    let now = Timestamp::now().unix_seconds().max(0) as u64;
    let deadline = now.saturating_add(deadline_window_secs);
    let owner = holder.address();

    let mut batch = PermitBatch::default();

    for handle in handles {
        if handle.asset.is_native() {
            continue;
        }

        let outgoing = adjustments.get(&handle.asset).copied().unwrap_or(0);
        let net = handle.balance.checked_sub(outgoing).ok_or_else(|| {
            KeywardError::InsufficientBalance {
                reason: format!(
                    "asset {}: balance {} cannot cover outgoing {}",
                    handle.asset, handle.balance, outgoing
                ),
            }
        })?;

        if net == 0 {
            continue;
        }

        if !handle.supports_permits {
            batch.skipped.push(handle.asset);
            continue;
        }

        let message = PermitMessage {
            asset: handle.asset,
            owner,
            spender,
            value: net,
            nonce: handle.permit_nonce,
            deadline,
        };
        let signature = holder.sign(&message.signable_bytes());

        batch.permits.push(Permit {
            asset: handle.asset,
            amount: net,
            deadline,
            signature,
            owner_public_key: holder.public_key(),
            recipient,
        });
    }

    Ok(batch)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
