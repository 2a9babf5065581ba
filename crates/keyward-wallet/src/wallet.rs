//! Seed custody: encryption at rest and the lock/unlock lifecycle.
//!
//! A [`WalletSession`] holds the 64-byte master seed that all rotation
//! keys derive from. At rest the seed is encrypted with a key derived
//! from the user passphrase via Argon2id and sealed with
//! XChaCha20-Poly1305. The plaintext seed is only held in memory while
//! the session is in the [`SessionState::Unlocked`] state; locking
//! zeroizes it.

use keyward_crypto::aead::{decrypt_xchacha20, encrypt_xchacha20, generate_aead_nonce, AeadNonce};
use keyward_crypto::derive::ExtendedKey;
use keyward_crypto::hash::sha3_256;
use keyward_crypto::kdf::{derive_key, Argon2Params};
use keyward_types::{KeywardError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of the master seed in bytes.
///
/// 64 bytes matches the SLIP-0010 master-generation input width, so
/// the full seed entropy feeds HMAC-SHA512 without truncation.
pub const SEED_LEN: usize = 64;

/// Additional authenticated data for seed AEAD encryption.
///
/// Binds the ciphertext to the seed file format. Decryption with any
/// other AAD fails authentication.
pub(crate) const SEED_AAD: &[u8] = b"kwd-seed-v1";

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lock state of a wallet session.
///
/// - `Locked` — no seed material in memory; derivation is unavailable.
/// - `Unlocked` — the seed is decrypted and held in memory, ready to
///   derive rotation keys. Transitions back via [`WalletSession::lock`].
pub enum SessionState {
    /// Seed is not in memory.
    Locked,
    /// Seed is decrypted and available.
    Unlocked(UnlockedSeed),
}

// ---------------------------------------------------------------------------
// UnlockedSeed
// ---------------------------------------------------------------------------

/// In-memory decrypted master seed.
///
/// The seed is wrapped in [`Zeroizing`] so it is scrubbed from memory
/// when this struct is dropped, either explicitly via
/// [`WalletSession::lock`] or when the session goes out of scope.
pub struct UnlockedSeed {
    seed: Zeroizing<[u8; SEED_LEN]>,
}

impl UnlockedSeed {
    /// Returns the SLIP-0010 master node for this seed.
    pub fn master(&self) -> Result<ExtendedKey> {
        ExtendedKey::master_from_seed(&self.seed[..])
    }
}

// ---------------------------------------------------------------------------
// WalletSession
// ---------------------------------------------------------------------------

/// Encrypted seed with passphrase-based lock/unlock lifecycle.
///
/// At rest the session stores only the AEAD ciphertext of the seed.
/// On [`unlock`](WalletSession::unlock) the seed is decrypted and its
/// SHA3-256 fingerprint is verified against the stored value, so a
/// passphrase that authenticates but decrypts to foreign material is
/// still rejected.
///
/// # Invariants
///
/// - `encrypted_seed` is the XChaCha20-Poly1305 ciphertext of the raw
///   64-byte seed, encrypted with an Argon2id-derived key.
/// - `fingerprint` is always `SHA3-256(seed)` of the seed recoverable
///   from `encrypted_seed`.
/// - The seed is never stored in a plaintext field.
pub struct WalletSession {
    /// SHA3-256 of the plaintext seed; safe to store and compare.
    fingerprint: [u8; 32],
    /// Current lock/unlock state.
    state: SessionState,
    /// XChaCha20-Poly1305 ciphertext of the seed + 16-byte tag.
    encrypted_seed: Vec<u8>,
    /// 32-byte random salt for Argon2id.
    salt: [u8; 32],
    /// 24-byte random nonce for XChaCha20-Poly1305.
    nonce: [u8; 24],
    /// Argon2id tuning parameters used during key derivation.
    argon2_params: Argon2Params,
}

impl WalletSession {
    // -- Accessors --------------------------------------------------------

    /// Returns the SHA3-256 fingerprint of the seed.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    /// Returns `true` if the session is currently unlocked.
    pub fn is_unlocked(&self) -> bool {
        matches!(self.state, SessionState::Unlocked(_))
    }

    /// Returns the encrypted seed ciphertext (for file serialization).
    pub fn encrypted_seed(&self) -> &[u8] {
        &self.encrypted_seed
    }

    /// Returns the Argon2id salt (for file serialization).
    pub fn salt(&self) -> &[u8; 32] {
        &self.salt
    }

    /// Returns the AEAD nonce (for file serialization).
    pub fn nonce(&self) -> &[u8; 24] {
        &self.nonce
    }

    /// Returns the Argon2id parameters (for file serialization).
    pub fn argon2_params(&self) -> &Argon2Params {
        &self.argon2_params
    }

    // -- Lifecycle --------------------------------------------------------

    /// Creates a new session around a freshly generated random seed.
    ///
    /// The seed comes from OS entropy. The returned session is
    /// **Locked**; call [`unlock`](Self::unlock) before deriving keys.
    ///
    /// # Errors
    ///
    /// - [`KeywardError::CryptoError`] if entropy gathering, key
    ///   derivation, or encryption fails.
    pub fn create(passphrase: &str) -> Result<Self> {
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        OsRng
            .try_fill_bytes(&mut seed[..])
            .map_err(|e| KeywardError::CryptoError {
                reason: format!("failed to generate random seed: {e}"),
            })?;
        Self::import(&seed, passphrase)
    }

    /// Creates a session around an existing 64-byte seed.
    ///
    /// # Process
    ///
    /// 1. Fingerprint the seed with SHA3-256.
    /// 2. Generate a 32-byte random salt and 24-byte random nonce.
    /// 3. Derive a 256-bit encryption key via Argon2id(passphrase, salt).
    /// 4. Encrypt the seed with XChaCha20-Poly1305.
    /// 5. Return the session in **Locked** state.
    ///
    /// # Errors
    ///
    /// - [`KeywardError::CryptoError`] if entropy gathering, key
    ///   derivation, or encryption fails.
    pub fn import(seed: &[u8; SEED_LEN], passphrase: &str) -> Result<Self> {
        // 1. Fingerprint.
        let fingerprint = sha3_256(seed);

        // 2. Salt and nonce.
        let mut salt = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| KeywardError::CryptoError {
                reason: format!("failed to generate random salt: {e}"),
            })?;
        let aead_nonce = generate_aead_nonce();

        // 3. Encryption key.
        let params = Argon2Params::default();
        let derived_key = derive_key(passphrase.as_bytes(), &salt, &params)?;

        // 4. Encrypt.
        let encrypted = encrypt_xchacha20(derived_key.as_bytes(), &aead_nonce, seed, SEED_AAD)?;

        // 5. Locked session.
        Ok(Self {
            fingerprint,
            state: SessionState::Locked,
            encrypted_seed: encrypted,
            salt,
            nonce: *aead_nonce.as_bytes(),
            argon2_params: params,
        })
    }

    /// Reconstructs a session from pre-validated file components.
    ///
    /// Intended for use after [`crate::wallet_file::read_seed_file`]
    /// has verified the header. No cryptographic validation is
    /// performed here; the fingerprint is checked on unlock.
    pub fn from_parts(
        fingerprint: [u8; 32],
        encrypted_seed: Vec<u8>,
        salt: [u8; 32],
        nonce: [u8; 24],
        argon2_params: Argon2Params,
    ) -> Self {
        Self {
            fingerprint,
            state: SessionState::Locked,
            encrypted_seed,
            salt,
            nonce,
            argon2_params,
        }
    }

    /// Unlocks the session by decrypting the seed.
    ///
    /// # Process
    ///
    /// 1. Derive the encryption key via Argon2id(passphrase, stored salt).
    /// 2. Decrypt the seed with XChaCha20-Poly1305.
    /// 3. Verify length and SHA3-256 fingerprint against stored values.
    /// 4. Transition to `Unlocked`.
    ///
    /// If the session is already unlocked, this is a no-op.
    ///
    /// # Errors
    ///
    /// - [`KeywardError::CryptoError`] if the passphrase is wrong (AEAD
    ///   authentication fails) or the recovered seed does not match the
    ///   stored fingerprint.
    pub fn unlock(&mut self, passphrase: &str) -> Result<()> {
        if matches!(self.state, SessionState::Unlocked(_)) {
            return Ok(());
        }

        // 1. Derive encryption key.
        let derived_key =
            derive_key(passphrase.as_bytes(), &self.salt, &self.argon2_params)?;

        // 2. Decrypt seed.
        let aead_nonce = AeadNonce::from_bytes(self.nonce);
        let mut plaintext = decrypt_xchacha20(
            derived_key.as_bytes(),
            &aead_nonce,
            &self.encrypted_seed,
            SEED_AAD,
        )?;

        // 3. Length and fingerprint checks. Zeroize plaintext in all paths.
        if plaintext.len() != SEED_LEN {
            plaintext.zeroize();
            return Err(KeywardError::CryptoError {
                reason: "decrypted payload has wrong seed length".into(),
            });
        }
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        seed.copy_from_slice(&plaintext);
        plaintext.zeroize();

        if sha3_256(&seed[..]) != self.fingerprint {
            return Err(KeywardError::CryptoError {
                reason: "decrypted seed does not match stored fingerprint".into(),
            });
        }

        // 4. Transition.
        self.state = SessionState::Unlocked(UnlockedSeed { seed });
        Ok(())
    }

    /// Locks the session, zeroizing the in-memory seed.
    ///
    /// If already locked, this is a no-op.
    pub fn lock(&mut self) {
        // Assignment drops the previous Unlocked variant, which drops
        // UnlockedSeed and zeroizes the seed bytes.
        self.state = SessionState::Locked;
    }

    /// Returns the SLIP-0010 master node derived from the seed.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::WalletError`] if the session is locked.
    pub fn master(&self) -> Result<ExtendedKey> {
        match &self.state {
            SessionState::Unlocked(unlocked) => unlocked.master(),
            SessionState::Locked => Err(KeywardError::WalletError {
                reason: "wallet is locked; call unlock() first".into(),
            }),
        }
    }

    /// Decrypts and returns a copy of the raw seed for backup export.
    ///
    /// Verifies the passphrase against the at-rest ciphertext even when
    /// the session is already unlocked, so an attacker with a live
    /// session still needs the passphrase to exfiltrate the seed.
    ///
    /// # Errors
    ///
    /// - [`KeywardError::CryptoError`] if the passphrase is wrong or
    ///   the recovered seed fails the fingerprint check.
    pub fn export_seed(&self, passphrase: &str) -> Result<Zeroizing<[u8; SEED_LEN]>> {
        let derived_key =
            derive_key(passphrase.as_bytes(), &self.salt, &self.argon2_params)?;
        let aead_nonce = AeadNonce::from_bytes(self.nonce);
        let mut plaintext = decrypt_xchacha20(
            derived_key.as_bytes(),
            &aead_nonce,
            &self.encrypted_seed,
            SEED_AAD,
        )?;

        if plaintext.len() != SEED_LEN {
            plaintext.zeroize();
            return Err(KeywardError::CryptoError {
                reason: "decrypted payload has wrong seed length".into(),
            });
        }
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        seed.copy_from_slice(&plaintext);
        plaintext.zeroize();

        if sha3_256(&seed[..]) != self.fingerprint {
            return Err(KeywardError::CryptoError {
                reason: "decrypted seed does not match stored fingerprint".into(),
            });
        }

        Ok(seed)
    }
}
