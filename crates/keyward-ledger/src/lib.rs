//! Ledger access and rotation orchestration.
//!
//! [`LedgerAdapter`] is the capability boundary every back-end
//! implements: fetch the key event log, submit a rotation bundle,
//! report balances and signing nonces. [`MemoryLedger`] is the
//! reference implementation backing tests and the dev CLI.
//! [`RotationCoordinator`] drives the full pipeline against any
//! adapter: gate on continuity, aggregate permits, build the bundle,
//! submit, retry once on a nonce conflict.

pub mod adapter;
pub mod capture;
pub mod coordinator;
pub mod memory;

pub use adapter::{LedgerAdapter, Recipient, TxReceipt, ValueTransfer};
pub use capture::{capture_key, KeySource};
pub use coordinator::{RotationCoordinator, RotationOutcome, RotationRequest};
pub use memory::MemoryLedger;
