//! XChaCha20-Poly1305 authenticated encryption with associated data.
//!
//! The only symmetric encryption in Keyward is the wallet seed at
//! rest. It uses XChaCha20-Poly1305 AEAD with 192-bit (24-byte)
//! nonces. Nonces are generated from OS entropy and **must never be
//! reused** with the same key.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use keyward_types::{KeywardError, Result};
use rand::rngs::OsRng;
use rand::RngCore;

// ---------------------------------------------------------------------------
// AeadNonce
// ---------------------------------------------------------------------------

/// 192-bit (24-byte) nonce for XChaCha20-Poly1305.
///
/// Specific to the AEAD cipher; unique per encryption operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AeadNonce([u8; 24]);

impl AeadNonce {
    /// Fixed byte length of an XChaCha20-Poly1305 nonce.
    pub const LEN: usize = 24;

    /// Creates an [`AeadNonce`] from raw bytes.
    pub fn from_bytes(bytes: [u8; 24]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying 24-byte array.
    pub fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }
}

/// Generates a fresh 192-bit random nonce from OS entropy.
///
/// The 192-bit space makes accidental collision negligible.
pub fn generate_aead_nonce() -> AeadNonce {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    AeadNonce(bytes)
}

// ---------------------------------------------------------------------------
// Encrypt / Decrypt
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` with XChaCha20-Poly1305.
///
/// `aad` is authenticated but **not** encrypted; pass `&[]` if unused.
/// The returned ciphertext has the 16-byte Poly1305 tag appended.
pub fn encrypt_xchacha20(
    key: &[u8; 32],
    nonce: &AeadNonce,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let xnonce = XNonce::from_slice(&nonce.0);
    let payload = Payload { msg: plaintext, aad };

    cipher
        .encrypt(xnonce, payload)
        .map_err(|e| KeywardError::CryptoError {
            reason: format!("XChaCha20-Poly1305 encryption failed: {e}"),
        })
}

/// Decrypts `ciphertext` with XChaCha20-Poly1305.
///
/// # Errors
///
/// Returns [`KeywardError::CryptoError`] if tag verification fails
/// (wrong key, wrong nonce, tampered ciphertext, or wrong AAD).
pub fn decrypt_xchacha20(
    key: &[u8; 32],
    nonce: &AeadNonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let xnonce = XNonce::from_slice(&nonce.0);
    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(xnonce, payload)
        .map_err(|e| KeywardError::CryptoError {
            reason: format!("XChaCha20-Poly1305 decryption failed: {e}"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() -> std::result::Result<(), KeywardError> {
        let key = [0x42u8; 32];
        let nonce = generate_aead_nonce();
        let plaintext = b"sixty-four bytes of seed material";
        let aad = b"metadata";

        let ciphertext = encrypt_xchacha20(&key, &nonce, plaintext, aad)?;
        assert_ne!(ciphertext.as_slice(), plaintext.as_slice());
        assert_eq!(ciphertext.len(), plaintext.len() + 16);

        let decrypted = decrypt_xchacha20(&key, &nonce, &ciphertext, aad)?;
        assert_eq!(decrypted.as_slice(), plaintext.as_slice());
        Ok(())
    }

    #[test]
    fn wrong_key_fails_decrypt() -> std::result::Result<(), KeywardError> {
        let key = [0x42u8; 32];
        let wrong_key = [0x43u8; 32];
        let nonce = generate_aead_nonce();

        let ciphertext = encrypt_xchacha20(&key, &nonce, b"secret", b"")?;
        let result = decrypt_xchacha20(&wrong_key, &nonce, &ciphertext, b"");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn wrong_nonce_fails_decrypt() -> std::result::Result<(), KeywardError> {
        let key = [0x42u8; 32];
        let nonce = generate_aead_nonce();
        let wrong_nonce = generate_aead_nonce();

        let ciphertext = encrypt_xchacha20(&key, &nonce, b"secret", b"")?;
        let result = decrypt_xchacha20(&key, &wrong_nonce, &ciphertext, b"");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn wrong_aad_fails_decrypt() -> std::result::Result<(), KeywardError> {
        let key = [0x42u8; 32];
        let nonce = generate_aead_nonce();

        let ciphertext = encrypt_xchacha20(&key, &nonce, b"secret", b"correct aad")?;
        let result = decrypt_xchacha20(&key, &nonce, &ciphertext, b"wrong aad");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn tampered_ciphertext_fails_decrypt() -> std::result::Result<(), KeywardError> {
        let key = [0x42u8; 32];
        let nonce = generate_aead_nonce();

        let mut ciphertext = encrypt_xchacha20(&key, &nonce, b"secret", b"")?;
        if let Some(byte) = ciphertext.first_mut() {
            *byte ^= 0xFF;
        }
        let result = decrypt_xchacha20(&key, &nonce, &ciphertext, b"");
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn generated_nonces_are_unique() {
        let n1 = generate_aead_nonce();
        let n2 = generate_aead_nonce();
        assert_ne!(n1.as_bytes(), n2.as_bytes());
    }
}
