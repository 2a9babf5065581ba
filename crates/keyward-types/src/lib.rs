//! Core shared types for the Keyward key-rotation protocol.
//!
//! This crate defines all fundamental types used across the workspace.
//! No other crate should define shared types — everything lives here.

pub mod config;

pub use config::RotationConfig;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fungible-asset amount in the ledger's smallest unit.
pub type Amount = u128;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Cryptographic address derived from SHA3-256(public_key).
///
/// This is the identity of one position in a key-rotation chain: every
/// commitment in a [`KeyLogEntry`] (prerotated, twice-prerotated,
/// predecessor) is an `Address`. Represented as a 32-byte hash of the
/// Ed25519 public key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    /// The fixed byte length of an address.
    pub const LEN: usize = 32;

    /// Creates a new `Address` from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The all-zero address. Never a valid rotation target.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = KeywardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| KeywardError::InvalidAddress {
            reason: "invalid hex encoding".into(),
        })?;
        if bytes.len() != 32 {
            return Err(KeywardError::InvalidAddress {
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Identifier of a fungible asset on the ledger.
///
/// The all-zero value denotes the chain's native asset, which moves via a
/// rotation transaction's own value field and never via a permit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct AssetId([u8; 32]);

impl AssetId {
    /// The fixed byte length of an asset identifier.
    pub const LEN: usize = 32;

    /// The native asset of the chain.
    pub const NATIVE: AssetId = AssetId([0u8; 32]);

    /// Creates a new `AssetId` from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns `true` if this is the chain's native asset.
    pub fn is_native(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for AssetId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AssetId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "{}", hex::encode(self.0))
        }
    }
}

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// Ledger-assigned identifier for a submitted rotation transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TxId([u8; 32]);

impl TxId {
    /// Creates a new `TxId` from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for TxId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// UTC timestamp in ISO 8601 format.
///
/// All timestamps use UTC so that permit deadlines and receipts order
/// deterministically regardless of timezone.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a `Timestamp` from a `DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns whole seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Returns the timestamp as an ISO 8601 string.
    pub fn as_str(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = KeywardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| KeywardError::ConfigError {
                reason: format!("invalid ISO 8601 timestamp: {e}"),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }
}

// ---------------------------------------------------------------------------
// KeyLogEntry
// ---------------------------------------------------------------------------

/// One rotation record in a key event log.
///
/// Created exactly once by a rotation submission and never mutated
/// thereafter, except for `on_chain` flipping from pending to confirmed.
/// Adapters translate ledger-native shapes into this canonical record
/// before the core ever sees them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyLogEntry {
    /// Address of this entry's key; unique per position in a given chain.
    pub public_key_hash: Address,
    /// Committed successor address.
    pub prerotated_key_hash: Address,
    /// Committed successor-of-successor address.
    pub twice_prerotated_key_hash: Address,
    /// Address of the entry immediately preceding this one.
    /// `None` only for the inception entry.
    pub prev_public_key_hash: Option<Address>,
    /// Address that must receive any value carried by this entry's
    /// transaction. Normally equals `prerotated_key_hash`.
    pub output_address: Address,
    /// Whether this entry also encodes an out-of-band relationship
    /// handshake. Carried through unaltered by the core.
    pub has_relationship: bool,
    /// `true` once the entry is confirmed on the ledger; `false` while
    /// it sits in a mempool or pending queue.
    pub on_chain: bool,
    /// Zero-based sequence index of this entry in the chain.
    pub rotation: u64,
}

impl KeyLogEntry {
    /// Returns `true` if this entry is still awaiting confirmation.
    pub fn pending(&self) -> bool {
        !self.on_chain
    }

    /// Checks the adjacent-pair chain invariant against the entry that
    /// precedes this one.
    ///
    /// Holds when the predecessor committed to this entry's key
    /// (`prev.prerotated_key_hash == self.public_key_hash`), committed
    /// twice-ahead to this entry's successor
    /// (`prev.twice_prerotated_key_hash == self.prerotated_key_hash`),
    /// and this entry points back at the predecessor.
    pub fn follows(&self, prev: &KeyLogEntry) -> bool {
        prev.prerotated_key_hash == self.public_key_hash
            && prev.twice_prerotated_key_hash == self.prerotated_key_hash
            && self.prev_public_key_hash == Some(prev.public_key_hash)
    }
}

// ---------------------------------------------------------------------------
// CandidateKey
// ---------------------------------------------------------------------------

/// The claims a locally-held key makes about its place in the chain.
///
/// This is the signature-free projection of scanned or derived key
/// material: everything the pure continuity and status checks need,
/// and nothing secret.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandidateKey {
    /// Address of the key itself.
    pub address: Address,
    /// Claimed committed successor address.
    pub prerotated_key_hash: Address,
    /// Claimed successor-of-successor address.
    pub twice_prerotated_key_hash: Address,
    /// Claimed predecessor address; `None` for an inception key.
    pub prev_public_key_hash: Option<Address>,
    /// Claimed zero-based position in the chain.
    pub rotation: u64,
}

// ---------------------------------------------------------------------------
// WalletStatus
// ---------------------------------------------------------------------------

/// Outcome of resolving local key material against a fetched log.
///
/// Drives whether bootstrap, rotation, or no action is required. The
/// resolver only classifies; all resulting actions are taken by the
/// caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    /// No local key material is present.
    NoKey,
    /// The key is the awaited next key and validates against the log
    /// tail; its inception/rotation transaction has not been submitted.
    NoTransaction,
    /// The key matches the log tail and is the live signing key.
    Active,
    /// The key appears earlier in the log with consistent history; a
    /// successor has taken over and the caller must advance.
    Revoked,
    /// The key's claims contradict the log's recorded commitments.
    InvalidContinuity,
    /// The ledger could not be consulted; retry or surface to operator.
    Error,
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoKey => write!(f, "no_key"),
            Self::NoTransaction => write!(f, "no_transaction"),
            Self::Active => write!(f, "active"),
            Self::Revoked => write!(f, "revoked"),
            Self::InvalidContinuity => write!(f, "invalid_continuity"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// KeywardError
// ---------------------------------------------------------------------------

/// Central error type for the Keyward system.
///
/// All crates in the workspace convert their internal errors into variants
/// of this enum, ensuring a unified error handling surface. Variants are
/// grouped by the component whose contract defines them.
#[derive(Debug, Error)]
pub enum KeywardError {
    // ----- Continuity errors ----------------------------------------------
    /// A candidate key's claims contradict the chain's recorded
    /// commitments. Always fatal to the current rotation attempt.
    #[error("broken key chain: {reason}")]
    BrokenChain {
        /// Which link failed, with the rotation index and addresses involved.
        reason: String,
    },

    /// An address is malformed, fails checksum validation, or is the
    /// zero address where a real target is required.
    #[error("invalid address: {reason}")]
    InvalidAddress {
        /// Human-readable description of why the address is invalid.
        reason: String,
    },

    // ----- Builder errors -------------------------------------------------
    /// The confirming signature does not belong to the claimed next key.
    /// Fatal; must abort before any ledger call.
    #[error("key mismatch: {reason}")]
    KeyMismatch {
        /// The expected and computed addresses.
        reason: String,
    },

    /// A balance is too small to cover the requested transfer.
    #[error("insufficient balance: {reason}")]
    InsufficientBalance {
        /// The asset, available amount, and required amount.
        reason: String,
    },

    // ----- Permit errors --------------------------------------------------
    /// An asset does not support permit signing. Non-fatal: the asset is
    /// skipped and its balance must be swept separately.
    #[error("permit unsupported: {reason}")]
    PermitUnsupported {
        /// The asset that lacks permit support.
        reason: String,
    },

    // ----- Ledger errors --------------------------------------------------
    /// The ledger could not be reached or answered with a transport
    /// failure.
    #[error("ledger unavailable: {reason}")]
    LedgerUnavailable {
        /// Human-readable description of the transport failure.
        reason: String,
    },

    /// A submission used a stale nonce, typically because a concurrent
    /// rotation already advanced the tail. Retried once after a re-fetch.
    #[error("nonce conflict: {reason}")]
    NonceConflict {
        /// The expected and presented nonces.
        reason: String,
    },

    /// The ledger understood the submission and refused it.
    #[error("ledger rejected submission: {reason}")]
    LedgerRejected {
        /// The ledger's stated reason for rejection.
        reason: String,
    },

    /// A rotation was requested while a prior submission for the same
    /// identity is still unconfirmed.
    #[error("rotation already in flight: {reason}")]
    RotationInFlight {
        /// The identity and pending rotation index.
        reason: String,
    },

    // ----- Capture errors -------------------------------------------------
    /// No key material was presented within the bounded capture window.
    /// Retryable without side effects.
    #[error("key capture timed out: {reason}")]
    CaptureTimeout {
        /// The attempt count and poll interval that elapsed.
        reason: String,
    },

    // ----- Ambient errors -------------------------------------------------
    /// Out-of-band key-transfer data does not match the wire format.
    #[error("malformed wire data: {reason}")]
    WireFormat {
        /// Which field failed to parse.
        reason: String,
    },

    /// A cryptographic operation failed (signing, verification,
    /// encryption, decryption, derivation).
    #[error("crypto error: {reason}")]
    CryptoError {
        /// Human-readable description of the cryptographic failure.
        reason: String,
    },

    /// A wallet custody operation failed (locked session, bad
    /// passphrase, seed handling).
    #[error("wallet error: {reason}")]
    WalletError {
        /// Human-readable description of the custody failure.
        reason: String,
    },

    /// A persistence operation failed (seed file, snapshot cache,
    /// ledger state file).
    #[error("storage error: {reason}")]
    StorageError {
        /// Human-readable description of the storage failure.
        reason: String,
    },

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Signable trait
// ---------------------------------------------------------------------------

/// Trait for types that can produce canonical bytes for Ed25519 signing.
///
/// Implementors define how their data is serialized into a byte sequence
/// that will be signed. The crypto crate performs the actual signing;
/// this trait lives in `keyward-types` so both the protocol and crypto
/// crates can reference it without circular dependencies.
pub trait Signable {
    /// Returns the canonical byte representation to be signed.
    fn signable_bytes(&self) -> Vec<u8>;
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`KeywardError`].
pub type Result<T> = std::result::Result<T, KeywardError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pkh: u8, pre: u8, twice: u8, prev: Option<u8>, rotation: u64) -> KeyLogEntry {
        KeyLogEntry {
            public_key_hash: Address::new([pkh; 32]),
            prerotated_key_hash: Address::new([pre; 32]),
            twice_prerotated_key_hash: Address::new([twice; 32]),
            prev_public_key_hash: prev.map(|b| Address::new([b; 32])),
            output_address: Address::new([pre; 32]),
            has_relationship: false,
            on_chain: true,
            rotation,
        }
    }

    #[test]
    fn address_roundtrip_hex() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let bytes = [0xABu8; 32];
        let addr = Address::new(bytes);
        let hex_str = addr.to_string();
        let parsed: Address = hex_str.parse()?;
        assert_eq!(addr, parsed);
        Ok(())
    }

    #[test]
    fn address_invalid_hex_length() {
        let result: std::result::Result<Address, _> = "abcd".parse();
        assert!(result.is_err());
    }

    #[test]
    fn address_invalid_hex_chars() {
        let result: std::result::Result<Address, _> = "zzzz".parse();
        assert!(result.is_err());
    }

    #[test]
    fn zero_address_detected() {
        assert!(Address::zero().is_zero());
        assert!(!Address::new([1u8; 32]).is_zero());
    }

    #[test]
    fn native_asset_detected() {
        assert!(AssetId::NATIVE.is_native());
        assert!(!AssetId::new([7u8; 32]).is_native());
        assert_eq!(AssetId::NATIVE.to_string(), "native");
    }

    #[test]
    fn timestamp_now_parses_back() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let ts = Timestamp::now();
        let s = ts.as_str();
        let parsed: Timestamp = s.parse()?;
        assert_eq!(ts.as_datetime(), parsed.as_datetime());
        Ok(())
    }

    #[test]
    fn entry_follows_valid_pair() {
        let a = entry(0x0A, 0x0B, 0x0C, None, 0);
        let b = entry(0x0B, 0x0C, 0x0D, Some(0x0A), 1);
        assert!(b.follows(&a));
    }

    #[test]
    fn entry_follows_rejects_wrong_successor() {
        let a = entry(0x0A, 0x0B, 0x0C, None, 0);
        let b = entry(0x0E, 0x0C, 0x0D, Some(0x0A), 1);
        assert!(!b.follows(&a));
    }

    #[test]
    fn entry_follows_rejects_wrong_twice_commitment() {
        let a = entry(0x0A, 0x0B, 0x0C, None, 0);
        let b = entry(0x0B, 0x0E, 0x0D, Some(0x0A), 1);
        assert!(!b.follows(&a));
    }

    #[test]
    fn entry_follows_rejects_missing_back_pointer() {
        let a = entry(0x0A, 0x0B, 0x0C, None, 0);
        let b = entry(0x0B, 0x0C, 0x0D, None, 1);
        assert!(!b.follows(&a));
    }

    #[test]
    fn pending_inverts_on_chain() {
        let mut e = entry(0x01, 0x02, 0x03, None, 0);
        assert!(!e.pending());
        e.on_chain = false;
        assert!(e.pending());
    }

    #[test]
    fn wallet_status_display() {
        assert_eq!(WalletStatus::NoKey.to_string(), "no_key");
        assert_eq!(WalletStatus::NoTransaction.to_string(), "no_transaction");
        assert_eq!(WalletStatus::Active.to_string(), "active");
        assert_eq!(WalletStatus::Revoked.to_string(), "revoked");
        assert_eq!(
            WalletStatus::InvalidContinuity.to_string(),
            "invalid_continuity"
        );
        assert_eq!(WalletStatus::Error.to_string(), "error");
    }

    #[test]
    fn wallet_status_serde_snake_case() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(&WalletStatus::InvalidContinuity)?;
        assert_eq!(json, "\"invalid_continuity\"");
        let parsed: WalletStatus = serde_json::from_str("\"revoked\"")?;
        assert_eq!(parsed, WalletStatus::Revoked);
        Ok(())
    }

    #[test]
    fn entry_serde_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let e = entry(0x11, 0x22, 0x33, Some(0x44), 3);
        let json = serde_json::to_string(&e)?;
        let parsed: KeyLogEntry = serde_json::from_str(&json)?;
        assert_eq!(e, parsed);
        Ok(())
    }

    #[test]
    fn address_serde_json_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let addr = Address::new([0x11u8; 32]);
        let json = serde_json::to_string(&addr)?;
        let parsed: Address = serde_json::from_str(&json)?;
        assert_eq!(addr, parsed);
        Ok(())
    }

    #[test]
    fn error_display() {
        let err = KeywardError::BrokenChain {
            reason: "tail committed to a different key".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tail committed"));
    }
}
