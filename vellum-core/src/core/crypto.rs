//! Password hashing, session-key derivation, and the record encryption envelope.
//!
//! Two deliberately separate derivations run over the same plaintext password:
//!
//! - The **verification hash** is an Argon2id PHC string stored on disk and
//!   used only to check login attempts. It is salted by the PHC mechanism and
//!   never doubles as key material.
//! - The **session key** is a 32-byte Argon2id output over the password and a
//!   dedicated persisted salt. It exists only in memory and keys the cipher.
//!
//! Records are sealed with XChaCha20-Poly1305. The 24-byte nonce is drawn
//! fresh from the system CSPRNG for every seal and prepended to the
//! ciphertext, so a nonce can never repeat across records under one key.

use crate::{Result, VellumError};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

/// XChaCha20-Poly1305 nonce length in bytes.
const NONCE_LEN: usize = 24;

/// Poly1305 authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Length of the persisted session-key derivation salt.
pub const KDF_SALT_LEN: usize = 16;

/// A symmetric key derived from an authenticated password.
///
/// Held only in memory and zeroed on drop; re-derived via `auth` after every
/// process restart.
pub type SessionKey = Zeroizing<[u8; 32]>;

/// Hashes a password into a self-contained Argon2id PHC string for storage.
///
/// The string embeds the salt and cost parameters, so verification needs no
/// separately stored state. Cost follows the argon2 crate's
/// interactive-login defaults.
///
/// # Errors
///
/// Returns [`VellumError::Crypto`] if hashing fails.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| VellumError::Crypto(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verifies a password attempt against a stored PHC string.
///
/// # Errors
///
/// Returns [`VellumError::InvalidCredentials`] on mismatch, or
/// [`VellumError::Crypto`] if the stored hash is malformed.
pub fn verify_password(plaintext: &str, stored: &str) -> Result<()> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| VellumError::Crypto(format!("stored verification hash is malformed: {e}")))?;

    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(argon2::password_hash::Error::Password) => Err(VellumError::InvalidCredentials),
        Err(e) => Err(VellumError::Crypto(format!(
            "password verification failed: {e}"
        ))),
    }
}

/// Generates a random salt for the session-key derivation.
pub fn generate_kdf_salt() -> [u8; KDF_SALT_LEN] {
    let mut salt = [0u8; KDF_SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derives the 32-byte session key from a password and the persisted salt.
///
/// Deterministic: the same password and salt always yield the same key, which
/// is what lets a later session decrypt entries written in an earlier one.
///
/// # Errors
///
/// Returns [`VellumError::Crypto`] if the derivation fails.
pub fn derive_session_key(plaintext: &str, salt: &[u8; KDF_SALT_LEN]) -> Result<SessionKey> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(plaintext.as_bytes(), salt, key.as_mut())
        .map_err(|e| VellumError::Crypto(format!("session key derivation failed: {e}")))?;
    Ok(key)
}

/// Encrypts serialized entry bytes, returning the `nonce || ciphertext+tag`
/// envelope stored on disk.
///
/// # Errors
///
/// Returns [`VellumError::Crypto`] if encryption fails.
pub fn seal(key: &SessionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_ref()));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| VellumError::Crypto("record encryption failed".to_string()))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Decrypts a stored envelope back to the serialized entry bytes.
///
/// # Errors
///
/// Returns [`VellumError::DecryptionFailure`] if the envelope is too short or
/// the authentication tag does not verify (wrong key, or tampered/corrupted
/// record).
pub fn open(key: &SessionKey, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(VellumError::DecryptionFailure);
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_ref()));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| VellumError::DecryptionFailure)
}
