//! Key event log: the ordered view of rotation entries for one identity.
//!
//! Adapters fetch ledger-native records, translate them into canonical
//! [`KeyLogEntry`] values, and hand them to [`KeyEventLog::from_entries`]
//! for normalization. All continuity and status checks operate on this
//! normalized view.

use keyward_types::{Address, KeyLogEntry, KeywardError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// KeyEventLog
// ---------------------------------------------------------------------------

/// Append-only sequence of rotation entries for one identity, ordered
/// by rotation index.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyEventLog {
    entries: Vec<KeyLogEntry>,
}

impl KeyEventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a normalized log from fetched entries.
    ///
    /// Entries are sorted by rotation index; if the same index appears
    /// more than once, the first occurrence in fetch order wins.
    pub fn from_entries(mut entries: Vec<KeyLogEntry>) -> Self {
        entries.sort_by_key(|e| e.rotation);
        entries.dedup_by_key(|e| e.rotation);
        Self { entries }
    }

    /// Appends an entry at the end of the log.
    ///
    /// The caller is responsible for the entry actually extending the
    /// chain; [`KeyEventLog::audit_chain`] verifies after the fact.
    pub fn push(&mut self, entry: KeyLogEntry) {
        self.entries.push(entry);
    }

    /// Number of entries in the log.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the log has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in rotation order.
    pub fn entries(&self) -> &[KeyLogEntry] {
        &self.entries
    }

    /// The most recent entry, pending or confirmed.
    pub fn tail(&self) -> Option<&KeyLogEntry> {
        self.entries.last()
    }

    /// Finds the entry whose key has the given address, regardless of
    /// confirmation status.
    pub fn find(&self, address: &Address) -> Option<&KeyLogEntry> {
        self.entries.iter().find(|e| e.public_key_hash == *address)
    }

    /// Finds the confirmed (non-pending) entry whose key has the given
    /// address.
    pub fn find_confirmed(&self, address: &Address) -> Option<&KeyLogEntry> {
        self.entries
            .iter()
            .find(|e| e.on_chain && e.public_key_hash == *address)
    }

    /// Returns `true` if the given address appears as a confirmed entry.
    pub fn contains_confirmed(&self, address: &Address) -> bool {
        self.find_confirmed(address).is_some()
    }

    /// Returns `true` if any entry is still awaiting confirmation.
    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.pending())
    }

    /// Flips every pending entry to confirmed, returning how many
    /// changed. Confirmation is the only mutation an entry ever sees.
    pub fn confirm_all(&mut self) -> usize {
        let mut flipped = 0;
        for entry in &mut self.entries {
            if entry.pending() {
                entry.on_chain = true;
                flipped += 1;
            }
        }
        flipped
    }

    /// Audits the full chain-integrity invariant.
    ///
    /// # Process
    ///
    /// 1. Rotation indices must be exactly `0..len`, in order.
    /// 2. The inception entry must have no predecessor pointer.
    /// 3. Every adjacent pair must satisfy
    ///    [`KeyLogEntry::follows`].
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::BrokenChain`] naming the first rotation
    /// index at which the invariant fails.
    pub fn audit_chain(&self) -> Result<()> {
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.rotation != i as u64 {
                return Err(KeywardError::BrokenChain {
                    reason: format!(
                        "expected rotation {i} at position {i}, found {}",
                        entry.rotation
                    ),
                });
            }
        }

        if let Some(first) = self.entries.first() {
            if first.prev_public_key_hash.is_some() {
                return Err(KeywardError::BrokenChain {
                    reason: "inception entry carries a predecessor pointer".into(),
                });
            }
        }

        for pair in self.entries.windows(2) {
            if !pair[1].follows(&pair[0]) {
                return Err(KeywardError::BrokenChain {
                    reason: format!(
                        "entry at rotation {} does not chain from rotation {}: \
                         predecessor committed to {} then {}",
                        pair[1].rotation,
                        pair[0].rotation,
                        pair[0].prerotated_key_hash,
                        pair[0].twice_prerotated_key_hash
                    ),
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
