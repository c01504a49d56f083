// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id key derivation from a master password.
//!
//! One Argon2id run produces 96 bytes, split into three independent 32-byte
//! keys: the field cipher key, the verifier key, and the tag nonce key.

use lockbox_core::{KdfParams, LockboxError};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Salt length written for new verifiers.
pub const SALT_LEN: usize = 16;

const OUTPUT_LEN: usize = 96;

/// Key material derived from one master password. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    /// AES-256-GCM key for field and tag ciphertext.
    pub cipher: [u8; 32],
    /// HMAC key whose tag over a fixed context is stored as the verifier.
    pub verifier: [u8; 32],
    /// HMAC key for synthetic tag nonces.
    pub tag_nonce: [u8; 32],
}

/// Derive the key triple from `passphrase` and `salt` using Argon2id.
pub fn derive_keys(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<DerivedKeys, LockboxError> {
    let argon_params = argon2::Params::new(
        params.memory_cost,
        params.iterations,
        params.parallelism,
        Some(OUTPUT_LEN),
    )
    .map_err(|e| LockboxError::Crypto(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 =
        argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon_params);

    let mut output = Zeroizing::new([0u8; OUTPUT_LEN]);
    argon2
        .hash_password_into(passphrase, salt, output.as_mut())
        .map_err(|e| LockboxError::Crypto(format!("Argon2id key derivation failed: {e}")))?;

    let mut keys = DerivedKeys {
        cipher: [0u8; 32],
        verifier: [0u8; 32],
        tag_nonce: [0u8; 32],
    };
    keys.cipher.copy_from_slice(&output[..32]);
    keys.verifier.copy_from_slice(&output[32..64]);
    keys.tag_nonce.copy_from_slice(&output[64..]);
    Ok(keys)
}

/// Generate a random salt for Argon2id.
pub fn generate_salt() -> Result<[u8; SALT_LEN], LockboxError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| LockboxError::Crypto("failed to generate random salt".to_string()))?;
    Ok(salt)
}
