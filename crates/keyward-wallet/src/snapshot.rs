//! Cached chain state for offline status reads.
//!
//! After each successful ledger interaction the wallet writes a JSON
//! snapshot of the fetched log and its own current claims. When the
//! ledger is unreachable, status commands fall back to this cache
//! instead of failing outright.
//!
//! # File format (v1)
//!
//! ```json
//! {
//!   "version": 1,
//!   "claims": { ... } | null,
//!   "log": { "entries": [ ... ] },
//!   "saved_at": "<RFC 3339 UTC>"
//! }
//! ```
//!
//! No secret material is ever written here; claims and log entries
//! contain only addresses.

use std::path::Path;

use keyward_protocol::KeyEventLog;
use keyward_types::{CandidateKey, KeywardError, Result, Timestamp};
use serde::{Deserialize, Serialize};

const SNAPSHOT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// WalletSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of the wallet's view of the chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletSnapshot {
    version: u32,
    /// Claims of the key that was current when the snapshot was taken.
    pub claims: Option<CandidateKey>,
    /// Log as last fetched from the ledger.
    pub log: KeyEventLog,
    /// When the snapshot was written.
    pub saved_at: Timestamp,
}

impl WalletSnapshot {
    /// Captures the current view with a fresh timestamp.
    pub fn capture(claims: Option<CandidateKey>, log: KeyEventLog) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            claims,
            log,
            saved_at: Timestamp::now(),
        }
    }

    /// Saves the snapshot atomically (write to `.tmp`, then rename).
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::StorageError`] on serialization or I/O
    /// failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| KeywardError::StorageError {
                reason: format!("failed to serialize snapshot: {e}"),
            })?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| KeywardError::StorageError {
            reason: format!("failed to write snapshot file: {e}"),
        })?;

        std::fs::rename(&tmp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            KeywardError::StorageError {
                reason: format!("failed to rename snapshot file: {e}"),
            }
        })?;

        tracing::debug!(path = %path.display(), entries = self.log.len(), "snapshot saved");
        Ok(())
    }

    /// Loads a snapshot, returning `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::StorageError`] if the file exists but
    /// cannot be read, parsed, or has an unsupported version.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(path).map_err(|e| KeywardError::StorageError {
            reason: format!("failed to read snapshot file: {e}"),
        })?;

        let snapshot: Self =
            serde_json::from_str(&json).map_err(|e| KeywardError::StorageError {
                reason: format!("failed to parse snapshot file: {e}"),
            })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(KeywardError::StorageError {
                reason: format!(
                    "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                    snapshot.version
                ),
            });
        }

        Ok(Some(snapshot))
    }
}
