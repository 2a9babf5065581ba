//! Wallet status resolution.
//!
//! Maps locally-held key claims plus a fetched log onto a
//! [`WalletStatus`], deciding whether bootstrap, rotation, or no action
//! is required. Resolution is pure and idempotent; ledger fetch
//! failures are mapped to [`WalletStatus::Error`] by the caller at the
//! I/O boundary, never in here.

use keyward_types::{CandidateKey, WalletStatus};

use crate::log::KeyEventLog;

/// Resolves the wallet status for locally-held key claims.
///
/// # Process
///
/// 1. No local key material → `NoKey`.
/// 2. The key is the log tail (pending or confirmed) → `Active`.
/// 3. The key matches a confirmed non-tail entry → it has been
///    superseded. If its claims correspond to the recorded entry
///    (both forward commitments agree with what the log recorded, and
///    either it is an inception key with no predecessor or the claimed
///    predecessor is itself confirmed in the log) → `Revoked`;
///    otherwise → `InvalidContinuity`.
/// 4. The key claims the awaited rotation index (`rotation ==
///    log.len()`): the tail must have committed to exactly this key →
///    `NoTransaction` (submit the inception or rotation now);
///    any mismatch → `InvalidContinuity`. On an empty log the key
///    must carry no predecessor pointer.
/// 5. Anything else claims a position the log knows nothing about →
///    `InvalidContinuity`.
pub fn resolve(local: Option<&CandidateKey>, log: &KeyEventLog) -> WalletStatus {
    let Some(local) = local else {
        return WalletStatus::NoKey;
    };

    if let Some(tail) = log.tail() {
        if tail.public_key_hash == local.address {
            return WalletStatus::Active;
        }
    }

    if let Some(matched) = log.find_confirmed(&local.address) {
        let commitments_agree = matched.prerotated_key_hash == local.prerotated_key_hash
            && matched.twice_prerotated_key_hash == local.twice_prerotated_key_hash;
        let lineage_holds = match local.prev_public_key_hash {
            None => local.rotation == 0,
            Some(prev) => log.contains_confirmed(&prev),
        };
        return if commitments_agree && lineage_holds {
            WalletStatus::Revoked
        } else {
            WalletStatus::InvalidContinuity
        };
    }

    if local.rotation == log.len() as u64 {
        return match log.tail() {
            Some(tail) => {
                let awaited = local.prev_public_key_hash == Some(tail.public_key_hash)
                    && tail.prerotated_key_hash == local.address
                    && tail.twice_prerotated_key_hash == local.prerotated_key_hash;
                if awaited {
                    WalletStatus::NoTransaction
                } else {
                    WalletStatus::InvalidContinuity
                }
            }
            None => {
                if local.prev_public_key_hash.is_some() {
                    WalletStatus::InvalidContinuity
                } else {
                    WalletStatus::NoTransaction
                }
            }
        };
    }

    WalletStatus::InvalidContinuity
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_types::{Address, KeyLogEntry};

    fn addr(b: u8) -> Address {
        Address::new([b; 32])
    }

    fn entry(pkh: u8, pre: u8, twice: u8, prev: Option<u8>, rotation: u64) -> KeyLogEntry {
        KeyLogEntry {
            public_key_hash: addr(pkh),
            prerotated_key_hash: addr(pre),
            twice_prerotated_key_hash: addr(twice),
            prev_public_key_hash: prev.map(addr),
            output_address: addr(pre),
            has_relationship: false,
            on_chain: true,
            rotation,
        }
    }

    fn candidate(a: u8, pre: u8, twice: u8, prev: Option<u8>, rotation: u64) -> CandidateKey {
        CandidateKey {
            address: addr(a),
            prerotated_key_hash: addr(pre),
            twice_prerotated_key_hash: addr(twice),
            prev_public_key_hash: prev.map(addr),
            rotation,
        }
    }

    fn two_entry_log() -> KeyEventLog {
        KeyEventLog::from_entries(vec![
            entry(0x0A, 0x0B, 0x0C, None, 0),
            entry(0x0B, 0x0C, 0x0D, Some(0x0A), 1),
        ])
    }

    #[test]
    fn missing_key_resolves_no_key() {
        assert_eq!(resolve(None, &KeyEventLog::new()), WalletStatus::NoKey);
    }

    #[test]
    fn tail_key_resolves_active() {
        let log = two_entry_log();
        let local = candidate(0x0B, 0x0C, 0x0D, Some(0x0A), 1);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::Active);
    }

    #[test]
    fn pending_tail_still_resolves_active() {
        let mut entries = vec![
            entry(0x0A, 0x0B, 0x0C, None, 0),
            entry(0x0B, 0x0C, 0x0D, Some(0x0A), 1),
        ];
        entries[1].on_chain = false;
        let log = KeyEventLog::from_entries(entries);
        let local = candidate(0x0B, 0x0C, 0x0D, Some(0x0A), 1);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::Active);
    }

    #[test]
    fn superseded_key_with_consistent_history_revoked() {
        let log = two_entry_log();
        let local = candidate(0x0A, 0x0B, 0x0C, None, 0);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::Revoked);
    }

    #[test]
    fn superseded_key_with_mismatched_commitments_invalid() {
        let log = KeyEventLog::from_entries(vec![
            entry(0x0A, 0x0B, 0x0C, None, 0),
            entry(0x0B, 0x0C, 0x0D, Some(0x0A), 1),
            entry(0x0C, 0x0D, 0x0E, Some(0x0B), 2),
        ]);
        // Claims the wrong successor for its recorded entry.
        let local = candidate(0x0B, 0xEE, 0x0D, Some(0x0A), 1);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::InvalidContinuity);
    }

    #[test]
    fn forked_inception_key_with_diverged_commitments_invalid() {
        let log = two_entry_log();
        // Same address as the confirmed inception entry, no
        // predecessor, but the forward commitments diverge from what
        // the log recorded: a fork, not a clean retirement.
        let local = candidate(0x0A, 0xEE, 0x0C, None, 0);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::InvalidContinuity);
    }

    #[test]
    fn superseded_key_with_unconfirmed_predecessor_invalid() {
        let mut entries = vec![
            entry(0x0A, 0x0B, 0x0C, None, 0),
            entry(0x0B, 0x0C, 0x0D, Some(0x0A), 1),
            entry(0x0C, 0x0D, 0x0E, Some(0x0B), 2),
        ];
        entries[0].on_chain = false;
        let log = KeyEventLog::from_entries(entries);
        let local = candidate(0x0B, 0x0C, 0x0D, Some(0x0A), 1);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::InvalidContinuity);
    }

    #[test]
    fn awaited_key_resolves_no_transaction() {
        let log = two_entry_log();
        let local = candidate(0x0C, 0x0D, 0x0E, Some(0x0B), 2);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::NoTransaction);
    }

    #[test]
    fn awaited_key_with_wrong_commitments_invalid() {
        let log = two_entry_log();
        let local = candidate(0x0C, 0xEE, 0x0E, Some(0x0B), 2);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::InvalidContinuity);
    }

    #[test]
    fn awaited_key_without_predecessor_pointer_invalid() {
        let log = two_entry_log();
        let local = candidate(0x0C, 0x0D, 0x0E, None, 2);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::InvalidContinuity);
    }

    #[test]
    fn inception_key_on_empty_log_resolves_no_transaction() {
        let log = KeyEventLog::new();
        let local = candidate(0x0A, 0x0B, 0x0C, None, 0);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::NoTransaction);
    }

    #[test]
    fn inception_key_with_predecessor_on_empty_log_invalid() {
        let log = KeyEventLog::new();
        let local = candidate(0x0A, 0x0B, 0x0C, Some(0x09), 0);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::InvalidContinuity);
    }

    #[test]
    fn unknown_position_resolves_invalid() {
        let log = two_entry_log();
        // Not in the log, not the awaited index.
        let local = candidate(0x0F, 0x10, 0x11, Some(0x0E), 7);
        assert_eq!(resolve(Some(&local), &log), WalletStatus::InvalidContinuity);
    }

    #[test]
    fn resolution_is_idempotent() {
        let log = two_entry_log();
        let local = candidate(0x0C, 0x0D, 0x0E, Some(0x0B), 2);
        let first = resolve(Some(&local), &log);
        let second = resolve(Some(&local), &log);
        assert_eq!(first, second);
    }
}
