//! Continuity validation: is a candidate key a legal successor?
//!
//! A candidate's claims must line up with the commitments its
//! predecessor recorded on the ledger. Three situations arise: a
//! rotation checked against the log tail, a mid-transaction check
//! against the key currently in hand, and the three-key deployment
//! bootstrap. These checks are pure; callers decide whether a failure
//! aborts the flow or merely means the key was already superseded.

use keyward_types::{CandidateKey, KeywardError, Result};

use crate::log::KeyEventLog;

// ---------------------------------------------------------------------------
// ValidationMode
// ---------------------------------------------------------------------------

/// Which predecessor the candidate is checked against.
#[derive(Clone, Copy, Debug)]
pub enum ValidationMode<'a> {
    /// Check against the log tail. Used when the candidate is about to
    /// become the active key.
    Rotation,
    /// Check against the key currently in hand, mid-transaction. Used
    /// when the next key is scanned while the current key is still
    /// active; the log tail may already be the current key itself.
    TransactionFlow {
        /// Claims of the active key the wallet currently holds.
        current: &'a CandidateKey,
    },
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validates a candidate key's continuity claims.
///
/// A candidate at rotation 0 has no predecessor and passes once its
/// addresses are well-formed. For rotation > 0 the mode's predecessor
/// must have committed to exactly this candidate; rotation mode reads
/// that predecessor off the log tail, transaction-flow mode off the
/// key in hand, so only the former needs log entries at all.
///
/// # Errors
///
/// - [`KeywardError::InvalidAddress`] if any claimed address is the
///   zero address, checked before any chain rule.
/// - [`KeywardError::BrokenChain`] if the predecessor's commitments do
///   not match the candidate's claims.
pub fn validate(
    candidate: &CandidateKey,
    log: &KeyEventLog,
    mode: ValidationMode<'_>,
) -> Result<()> {
    check_addresses(candidate)?;

    if candidate.rotation == 0 {
        return Ok(());
    }

    let chained = match mode {
        ValidationMode::Rotation => {
            let Some(tail) = log.tail() else {
                return Err(KeywardError::BrokenChain {
                    reason: format!(
                        "no key event log entries found, but rotation {} requires a \
                         previous key",
                        candidate.rotation
                    ),
                });
            };
            tail.prerotated_key_hash == candidate.address
                && tail.twice_prerotated_key_hash == candidate.prerotated_key_hash
                && candidate
                    .prev_public_key_hash
                    .map_or(true, |prev| tail.public_key_hash == prev)
        }
        ValidationMode::TransactionFlow { current } => {
            candidate.address == current.prerotated_key_hash
                && candidate.prerotated_key_hash == current.twice_prerotated_key_hash
                && candidate
                    .prev_public_key_hash
                    .map_or(true, |prev| current.address == prev)
        }
    };

    if !chained {
        return Err(KeywardError::BrokenChain {
            reason: format!(
                "the presented key (rotation {}) does not maintain continuity \
                 with the previous key: {}",
                candidate.rotation, candidate.address
            ),
        });
    }

    Ok(())
}

/// Validates the three-key deployment bootstrap sequence.
///
/// Exactly three candidates are required, at rotations `0, 1, 2`, with
/// the first carrying no predecessor pointer and each adjacent pair
/// satisfying the chain-integrity invariant.
///
/// # Errors
///
/// - [`KeywardError::InvalidAddress`] if any claimed address is zero.
/// - [`KeywardError::BrokenChain`] on any count, ordering, or
///   commitment violation.
pub fn validate_bootstrap(candidates: &[CandidateKey]) -> Result<()> {
    if candidates.len() != 3 {
        return Err(KeywardError::BrokenChain {
            reason: format!(
                "deployment bootstrap requires exactly 3 keys, got {}",
                candidates.len()
            ),
        });
    }

    for candidate in candidates {
        check_addresses(candidate)?;
    }

    for (i, candidate) in candidates.iter().enumerate() {
        if candidate.rotation != i as u64 {
            return Err(KeywardError::BrokenChain {
                reason: format!(
                    "bootstrap key at position {i} claims rotation {}",
                    candidate.rotation
                ),
            });
        }
    }

    if candidates[0].prev_public_key_hash.is_some() {
        return Err(KeywardError::BrokenChain {
            reason: "bootstrap inception key carries a predecessor pointer".into(),
        });
    }

    for pair in candidates.windows(2) {
        let ok = pair[0].prerotated_key_hash == pair[1].address
            && pair[0].twice_prerotated_key_hash == pair[1].prerotated_key_hash
            && pair[1].prev_public_key_hash == Some(pair[0].address);
        if !ok {
            return Err(KeywardError::BrokenChain {
                reason: format!(
                    "bootstrap keys at rotations {} and {} are not chained",
                    pair[0].rotation, pair[1].rotation
                ),
            });
        }
    }

    Ok(())
}

/// Rejects zero addresses in a candidate's claims.
fn check_addresses(candidate: &CandidateKey) -> Result<()> {
    if candidate.address.is_zero() {
        return Err(KeywardError::InvalidAddress {
            reason: format!(
                "zero key address at rotation {}",
                candidate.rotation
            ),
        });
    }
    if candidate.prerotated_key_hash.is_zero() {
        return Err(KeywardError::InvalidAddress {
            reason: format!(
                "zero prerotated key hash at rotation {}",
                candidate.rotation
            ),
        });
    }
    if candidate.twice_prerotated_key_hash.is_zero() {
        return Err(KeywardError::InvalidAddress {
            reason: format!(
                "zero twice-prerotated key hash at rotation {}",
                candidate.rotation
            ),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
