//! Shared setup threaded into every command handler.
//!
//! The data directory holds three files:
//!
//! - `seed.dat`      — encrypted master seed (binary, fixed width)
//! - `ledger.json`   — the dev ledger's state snapshot
//! - `snapshot.json` — the wallet's cached view of the chain
//!
//! All commands operate through this context so paths, passphrase
//! sourcing, and the second factor resolve in exactly one place.

use std::path::PathBuf;

use keyward_ledger::{MemoryLedger, RotationCoordinator};
use keyward_protocol::KeyEventLog;
use keyward_types::{CandidateKey, RotationConfig};
use keyward_wallet::{
    read_seed_file, write_seed_file, SeedFileHeader, WalletSession, WalletSnapshot,
};

const SEED_FILE: &str = "seed.dat";
const LEDGER_FILE: &str = "ledger.json";
const SNAPSHOT_FILE: &str = "snapshot.json";

/// Environment variable consulted before prompting for a passphrase.
const PASSPHRASE_ENV: &str = "KEYWARD_PASSPHRASE";

/// Environment variable consulted when `--factor` is absent.
const FACTOR_ENV: &str = "KEYWARD_FACTOR";

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Resolved global options plus the data directory layout.
pub struct Context {
    pub json: bool,
    data_dir: PathBuf,
    factor: Option<String>,
}

impl Context {
    pub fn new(json: bool, data_dir: PathBuf, factor: Option<String>) -> Self {
        Self {
            json,
            data_dir,
            factor,
        }
    }

    // -- Paths ------------------------------------------------------------

    pub fn seed_path(&self) -> PathBuf {
        self.data_dir.join(SEED_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    /// Creates the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> std::result::Result<(), String> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| format!("failed to create data directory: {e}"))
    }

    // -- Inputs -----------------------------------------------------------

    /// Resolves the second factor from `--factor` or the environment.
    pub fn factor(&self) -> std::result::Result<String, String> {
        if let Some(factor) = &self.factor {
            return Ok(factor.clone());
        }
        std::env::var(FACTOR_ENV).map_err(|_| {
            format!("no second factor given; pass --factor or set {FACTOR_ENV}")
        })
    }

    /// Reads the wallet passphrase from the environment or stdin.
    pub fn read_passphrase(&self, prompt: &str) -> String {
        if let Ok(pass) = std::env::var(PASSPHRASE_ENV) {
            return pass;
        }

        // Interactive prompt (simple, no echo hiding).
        eprint!("{prompt}");
        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err() {
            return String::new();
        }
        input.trim().to_string()
    }

    // -- Wallet -----------------------------------------------------------

    /// Loads the encrypted seed file into a locked session.
    pub fn load_session(&self) -> std::result::Result<WalletSession, String> {
        let path = self.seed_path();
        if !path.exists() {
            return Err(format!(
                "no wallet at {}; run 'keyward wallet init' first",
                path.display()
            ));
        }
        let (header, payload) = read_seed_file(&path).map_err(|e| e.to_string())?;
        Ok(WalletSession::from_parts(
            header.fingerprint,
            payload,
            header.salt,
            header.nonce,
            header.argon2_params,
        ))
    }

    /// Loads the seed file and unlocks it with the resolved passphrase.
    pub fn unlock_session(&self) -> std::result::Result<WalletSession, String> {
        let mut session = self.load_session()?;
        let passphrase = self.read_passphrase("Enter wallet passphrase: ");
        session
            .unlock(&passphrase)
            .map_err(|e| format!("failed to unlock wallet: {e}"))?;
        Ok(session)
    }

    /// Writes a session's encrypted material to the seed file.
    pub fn save_session(&self, session: &WalletSession) -> std::result::Result<(), String> {
        let header = SeedFileHeader {
            argon2_params: *session.argon2_params(),
            salt: *session.salt(),
            nonce: *session.nonce(),
            fingerprint: *session.fingerprint(),
        };
        write_seed_file(&self.seed_path(), &header, session.encrypted_seed())
            .map_err(|e| e.to_string())
    }

    // -- Ledger -----------------------------------------------------------

    /// Opens the file-backed dev ledger.
    pub fn open_ledger(&self) -> std::result::Result<MemoryLedger, String> {
        MemoryLedger::open(&self.ledger_path()).map_err(|e| e.to_string())
    }

    /// Builds a coordinator over the dev ledger with default tuning.
    pub fn coordinator(
        &self,
    ) -> std::result::Result<RotationCoordinator<MemoryLedger>, String> {
        Ok(RotationCoordinator::new(
            self.open_ledger()?,
            RotationConfig::default(),
        ))
    }

    // -- Snapshot ---------------------------------------------------------

    /// Caches the current chain view for offline reads.
    pub fn save_snapshot(
        &self,
        claims: Option<CandidateKey>,
        log: KeyEventLog,
    ) -> std::result::Result<(), String> {
        WalletSnapshot::capture(claims, log)
            .save(&self.snapshot_path())
            .map_err(|e| e.to_string())
    }

    /// Loads the cached chain view, if one was ever saved.
    pub fn load_snapshot(&self) -> std::result::Result<Option<WalletSnapshot>, String> {
        WalletSnapshot::load(&self.snapshot_path()).map_err(|e| e.to_string())
    }
}
