//! Aligning the derived key sequence with a fetched key event log.
//!
//! The seed plus second factor determine a fixed sequence of keypairs
//! `key[0], key[1], …` via the derivation ratchet. A [`KeyState`] is a
//! window onto that sequence positioned so that `current` is the key
//! the log is waiting for: the one committed by the tail entry's
//! prerotated hash, or `key[0]` when no log exists yet.

use keyward_crypto::derive::ExtendedKey;
use keyward_crypto::signing::Keypair;
use keyward_protocol::KeyEventLog;
use keyward_types::{CandidateKey, KeywardError, Result};

/// How many positions past the log length the alignment walk will
/// probe before declaring the seed/factor pair misaligned.
///
/// A healthy wallet always lands at exactly `log.len()`; the slack
/// only absorbs logs fetched from an adapter that is a few entries
/// ahead of the snapshot the wallet last saw.
const ALIGN_LOOKAHEAD: usize = 8;

// ---------------------------------------------------------------------------
// KeyState
// ---------------------------------------------------------------------------

/// A five-key window onto the derivation sequence, positioned at the
/// wallet's live rotation.
///
/// Holds the predecessor (absent at inception), the current signing
/// key, and three lookahead keys. Three are needed because a rotation
/// bundle pre-signs with `next`, whose own claims commit to
/// `next_next` and `next_next_next`.
pub struct KeyState {
    previous: Option<Keypair>,
    current: Keypair,
    next: Keypair,
    next_next: Keypair,
    next_next_next: Keypair,
    rotation: u64,
}

impl KeyState {
    /// Walks the derivation sequence until it lines up with `log`.
    ///
    /// # Process
    ///
    /// - Empty log: `current = key[0]`, no predecessor, rotation 0.
    /// - Non-empty log: advance until the current key's address equals
    ///   the tail entry's `prerotated_key_hash`. The predecessor is
    ///   the key walked over last; rotation is the number of steps
    ///   taken.
    ///
    /// The walk is capped at `log.len() + 8` steps.
    ///
    /// # Errors
    ///
    /// - [`KeywardError::WalletError`] if no key within the cap
    ///   matches the tail commitment (wrong seed or wrong factor).
    /// - [`KeywardError::CryptoError`] if derivation fails.
    pub fn align(master: &ExtendedKey, factor: &str, log: &KeyEventLog) -> Result<Self> {
        let mut node = master.step(factor)?;
        let mut previous: Option<Keypair> = None;
        let mut rotation = 0usize;

        if let Some(tail) = log.tail() {
            let target = tail.prerotated_key_hash;
            let cap = log.len() + ALIGN_LOOKAHEAD;
            while node.keypair().address() != target {
                if rotation >= cap {
                    return Err(KeywardError::WalletError {
                        reason: format!(
                            "no derived key within {cap} steps matches the log tail \
                             commitment {target}; seed or second factor does not \
                             belong to this identity"
                        ),
                    });
                }
                let successor = node.step(factor)?;
                previous = Some(node.keypair());
                node = successor;
                rotation += 1;
            }
        }

        let current = node.keypair();
        let n1 = node.step(factor)?;
        let n2 = n1.step(factor)?;
        let n3 = n2.step(factor)?;

        Ok(Self {
            previous,
            current,
            next: n1.keypair(),
            next_next: n2.keypair(),
            next_next_next: n3.keypair(),
            rotation: rotation as u64,
        })
    }

    // -- Accessors --------------------------------------------------------

    /// The key preceding `current`, if this is not the inception key.
    pub fn previous(&self) -> Option<&Keypair> {
        self.previous.as_ref()
    }

    /// The live signing key.
    pub fn current(&self) -> &Keypair {
        &self.current
    }

    /// The committed successor of `current`.
    pub fn next(&self) -> &Keypair {
        &self.next
    }

    /// Zero-based position of `current` in the derivation sequence.
    pub fn rotation(&self) -> u64 {
        self.rotation
    }

    /// Claims made by the current key.
    pub fn current_claims(&self) -> CandidateKey {
        CandidateKey {
            address: self.current.address(),
            prerotated_key_hash: self.next.address(),
            twice_prerotated_key_hash: self.next_next.address(),
            prev_public_key_hash: self.previous.as_ref().map(|k| k.address()),
            rotation: self.rotation,
        }
    }

    /// Claims the next key will make once it becomes current.
    pub fn next_claims(&self) -> CandidateKey {
        CandidateKey {
            address: self.next.address(),
            prerotated_key_hash: self.next_next.address(),
            twice_prerotated_key_hash: self.next_next_next.address(),
            prev_public_key_hash: Some(self.current.address()),
            rotation: self.rotation + 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
