//! Seed custody and derived key state for Keyward.
//!
//! Handles the wallet side of the rotation protocol:
//!
//! - **Create / Import** a 64-byte master seed
//! - **Encrypt** the seed to `seed.dat` (Argon2id + XChaCha20-Poly1305)
//! - **Lock / Unlock** with passphrase
//! - **Align** the derived key sequence with a fetched key event log
//! - **Snapshot** the last-seen chain state for offline reads
//!
//! Everything that touches plaintext seed material lives behind
//! [`wallet::WalletSession`]; the other modules only ever see derived
//! keypairs or public addresses.

pub mod keystate;
pub mod snapshot;
pub mod wallet;
pub mod wallet_file;

pub use keystate::KeyState;
pub use snapshot::WalletSnapshot;
pub use wallet::{SessionState, UnlockedSeed, WalletSession, SEED_LEN};
pub use wallet_file::{
    read_seed_file, write_seed_file, SeedFileHeader, SEED_FILE_MAGIC, SEED_FILE_VERSION,
};
