//! Cryptographic primitives for the Keyward key-rotation protocol.
//!
//! Provides Ed25519 signing and verification, SHA3-256 hashing,
//! factor-driven hardened key derivation, the Bech32 wire encoding
//! used for out-of-band key transfer, and the Argon2id +
//! XChaCha20-Poly1305 pair that keeps the wallet seed encrypted at
//! rest.
//!
//! All operations return [`keyward_types::Result`] and convert internal
//! failures into [`keyward_types::KeywardError::CryptoError`].

pub mod aead;
pub mod derive;
pub mod encoding;
pub mod hash;
pub mod kdf;
pub mod signing;
