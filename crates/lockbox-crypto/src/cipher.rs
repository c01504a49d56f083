// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Sealed output is `nonce (12 bytes) || ciphertext || tag (16 bytes)`, so a
//! single buffer carries everything needed to open it again.
//!
//! [`seal`] draws a fresh random 96-bit nonce for every call. [`seal_deterministic`]
//! derives the nonce from the plaintext with HMAC-SHA256 under a separate key,
//! so equal plaintexts seal to equal output. It is only used for tag labels,
//! which the storage layer has to compare without holding the key.

use lockbox_core::LockboxError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

/// Length of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Identifier persisted in `CryptoInfo::algorithm`.
pub const ALGORITHM: &str = "AES-256-GCM";

fn aead_key(key: &[u8; 32]) -> Result<LessSafeKey, LockboxError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| LockboxError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

fn seal_with_nonce(
    key: &[u8; 32],
    nonce_bytes: [u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, LockboxError> {
    let less_safe = aead_key(key)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| LockboxError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Encrypt `plaintext` under `key` with a random 96-bit nonce.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, LockboxError> {
    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| LockboxError::Crypto("failed to generate random nonce".to_string()))?;
    seal_with_nonce(key, nonce_bytes, plaintext)
}

/// Encrypt `plaintext` under `key` with a nonce derived from the plaintext
/// under `nonce_key`. Same inputs, same output.
pub fn seal_deterministic(
    key: &[u8; 32],
    nonce_key: &[u8; 32],
    plaintext: &[u8],
) -> Result<Vec<u8>, LockboxError> {
    let tag = hmac::sign(&hmac::Key::new(hmac::HMAC_SHA256, nonce_key), plaintext);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&tag.as_ref()[..NONCE_LEN]);
    seal_with_nonce(key, nonce_bytes, plaintext)
}

/// Decrypt a buffer produced by [`seal`] or [`seal_deterministic`].
///
/// Every failure (truncated input, wrong key, tampered bytes) is reported as
/// the same [`LockboxError::DecryptionFailed`].
pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, LockboxError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(LockboxError::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce =
        Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| LockboxError::DecryptionFailed)?;
    let less_safe = aead_key(key)?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = less_safe
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| LockboxError::DecryptionFailed)?;

    Ok(plaintext.to_vec())
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_random_key() -> Result<[u8; 32], LockboxError> {
    let rng = SystemRandom::new();
    let mut key = [0u8; 32];
    rng.fill(&mut key)
        .map_err(|_| LockboxError::Crypto("failed to generate random key".to_string()))?;
    Ok(key)
}
