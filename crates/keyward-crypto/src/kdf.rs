//! Passphrase stretching for seed encryption.
//!
//! A wallet passphrase never keys the cipher directly: it is stretched
//! through Argon2id into a 256-bit [`DerivedKey`] first. The cost
//! parameters travel inside the seed file header, so a file written
//! under older tuning keeps unlocking after the defaults move.

use keyward_types::{KeywardError, Result};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Width of the stretched key, in bytes.
const KEY_LEN: usize = 32;

/// Shortest salt the stretch accepts.
const MIN_SALT_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Argon2Params
// ---------------------------------------------------------------------------

/// Argon2id cost parameters, persisted alongside each encrypted seed.
///
/// The defaults (64 MiB, three passes, one lane) follow the RFC 9106
/// low-memory profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Passes over memory.
    pub t_cost: u32,
    /// Lanes of parallelism.
    pub p_cost: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            m_cost: 64 * 1024,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl Argon2Params {
    /// Builds the configured Argon2id hasher.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::ConfigError`] if the cost parameters
    /// fall outside the ranges the algorithm accepts (zero passes,
    /// zero lanes, too little memory per lane).
    fn hasher(&self) -> Result<argon2::Argon2<'static>> {
        let params = argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| KeywardError::ConfigError {
                reason: format!("unusable Argon2 parameters {self:?}: {e}"),
            })?;
        Ok(argon2::Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }
}

// ---------------------------------------------------------------------------
// DerivedKey
// ---------------------------------------------------------------------------

/// Stretched 256-bit encryption key.
///
/// Zeroized on drop, and deliberately neither `Clone` nor `Debug`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    /// Fixed byte length of the derived key.
    pub const LEN: usize = KEY_LEN;

    /// Raw key material, for handing to the AEAD layer.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// derive_key
// ---------------------------------------------------------------------------

/// Stretches `passphrase` and `salt` into a [`DerivedKey`].
///
/// # Errors
///
/// * [`KeywardError::ConfigError`] for a salt under 8 bytes or cost
///   parameters the algorithm rejects.
/// * [`KeywardError::CryptoError`] if the stretch itself fails.
pub fn derive_key(passphrase: &[u8], salt: &[u8], params: &Argon2Params) -> Result<DerivedKey> {
    if salt.len() < MIN_SALT_LEN {
        return Err(KeywardError::ConfigError {
            reason: format!("salt carries {} bytes, need at least {MIN_SALT_LEN}", salt.len()),
        });
    }

    let mut key = [0u8; KEY_LEN];
    params
        .hasher()?
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| KeywardError::CryptoError {
            reason: format!("passphrase stretch failed: {e}"),
        })?;
    Ok(DerivedKey(key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
