//! Core rotation protocol: key event logs, continuity validation,
//! status resolution, permits, and rotation-bundle construction.
//!
//! Everything in this crate is pure: functions take the log, the
//! candidate key data, and the holder's key material as explicit
//! parameters and never touch the network or shared mutable state.
//! Ledger I/O lives behind the adapter trait in `keyward-ledger`.

pub mod bundle;
pub mod continuity;
pub mod log;
pub mod permit;
pub mod status;
pub mod wire;

pub use bundle::{BundleRequest, BundleSide, RotationBundle};
pub use continuity::{validate, validate_bootstrap, ValidationMode};
pub use log::KeyEventLog;
pub use permit::{collect_permits, AssetHandle, Permit, PermitBatch};
pub use status::resolve;
pub use wire::ScannedKey;
