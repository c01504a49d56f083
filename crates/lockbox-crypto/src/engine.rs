// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The master-key session engine.
//!
//! [`CryptoEngine`] is the only holder of key material. It is either locked
//! (no key) or authenticated (one active [`DerivedKeys`]). Every path that
//! retires a key goes through [`CryptoEngine::lock`] or a key swap, and both
//! zeroize the retired bytes.

use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use lockbox_core::{
    CipherText, CryptoInfo, KdfParams, LockboxError, SealedFields, SealedNode, StorageBackend,
    Verifier, WriteOp,
};

use crate::cipher::{self, ALGORITHM};
use crate::kdf::{self, DerivedKeys};

/// Fixed message the verifier key signs to produce the stored check value.
const VERIFIER_CONTEXT: &[u8] = b"lockbox master password verifier v1";

fn check_value(keys: &DerivedKeys) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, &keys.verifier);
    hmac::sign(&key, VERIFIER_CONTEXT).as_ref().to_vec()
}

/// Constant-time comparison of `keys` against a stored verifier.
fn matches_verifier(keys: &DerivedKeys, stored: &Verifier) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, &keys.verifier);
    hmac::verify(&key, VERIFIER_CONTEXT, &stored.check).is_ok()
}

fn encrypt_with(keys: &DerivedKeys, plaintext: &str) -> Result<CipherText, LockboxError> {
    cipher::seal(&keys.cipher, plaintext.as_bytes()).map(|b| CipherText::from_bytes(&b))
}

fn encrypt_tag_with(keys: &DerivedKeys, tag: &str) -> Result<CipherText, LockboxError> {
    cipher::seal_deterministic(&keys.cipher, &keys.tag_nonce, tag.as_bytes())
        .map(|b| CipherText::from_bytes(&b))
}

fn decrypt_with(keys: &DerivedKeys, ciphertext: &CipherText) -> Result<String, LockboxError> {
    let sealed = ciphertext.to_bytes().ok_or(LockboxError::DecryptionFailed)?;
    let plaintext = cipher::open(&keys.cipher, &sealed)?;
    String::from_utf8(plaintext).map_err(|_| LockboxError::DecryptionFailed)
}

/// Re-seal one field under the new key. Tags keep their deterministic form.
fn reseal_field(
    old: &DerivedKeys,
    new: &DerivedKeys,
    value: &CipherText,
) -> Result<CipherText, LockboxError> {
    let mut plaintext = decrypt_with(old, value)?;
    let resealed = encrypt_with(new, &plaintext);
    plaintext.zeroize();
    resealed
}

fn reseal_tag(
    old: &DerivedKeys,
    new: &DerivedKeys,
    value: &CipherText,
) -> Result<CipherText, LockboxError> {
    let mut plaintext = decrypt_with(old, value)?;
    let resealed = encrypt_tag_with(new, &plaintext);
    plaintext.zeroize();
    resealed
}

/// Owns the live master key for one session.
///
/// Construct one per opened store and pass it explicitly to whatever needs
/// to encrypt or decrypt.
pub struct CryptoEngine {
    /// Parameters for newly derived verifiers (initialize, change_password).
    params: KdfParams,
    key: Option<DerivedKeys>,
}

impl std::fmt::Debug for CryptoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoEngine")
            .field("params", &self.params)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CryptoEngine {
    /// A locked engine that derives new keys with `params`.
    pub fn new(params: KdfParams) -> Self {
        Self { params, key: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.key.is_some()
    }

    /// Whether a master password has been set for `store`.
    pub async fn is_initialized(&self, store: &dyn StorageBackend) -> Result<bool, LockboxError> {
        Ok(store.load_key().await?.is_some())
    }

    /// First-time setup: derive a key from `password` and a fresh salt,
    /// persist the verifier and crypto info, and activate the key.
    pub async fn initialize(
        &mut self,
        store: &dyn StorageBackend,
        password: &SecretString,
    ) -> Result<Verifier, LockboxError> {
        if store.load_key().await?.is_some() {
            return Err(LockboxError::AlreadyInitialized);
        }

        let salt = kdf::generate_salt()?;
        let keys = kdf::derive_keys(password.expose_secret().as_bytes(), &salt, &self.params)?;
        let verifier = Verifier {
            salt: salt.to_vec(),
            check: check_value(&keys),
        };
        let info = CryptoInfo {
            algorithm: ALGORITHM.to_string(),
            kdf: self.params,
        };

        store
            .run_atomic(vec![
                WriteOp::SaveKey(verifier.clone()),
                WriteOp::SaveCryptoInfo(info),
            ])
            .await?;

        self.activate(keys);
        info!(backend = %store.name(), "master password initialized");
        Ok(verifier)
    }

    /// Check `candidate` against the stored verifier.
    ///
    /// On success the derived key becomes active. On failure the engine is
    /// left locked, whatever its state before the call.
    pub async fn authenticate(
        &mut self,
        store: &dyn StorageBackend,
        candidate: &SecretString,
    ) -> Result<bool, LockboxError> {
        let keys = match self.derive_against_stored(store, candidate).await? {
            Some(keys) => keys,
            None => {
                self.lock();
                debug!("master password rejected");
                return Ok(false);
            }
        };
        self.activate(keys);
        debug!("master password accepted");
        Ok(true)
    }

    /// Derive a key from `password` with the stored salt and parameters and
    /// return it only if it matches the stored verifier.
    async fn derive_against_stored(
        &self,
        store: &dyn StorageBackend,
        password: &SecretString,
    ) -> Result<Option<DerivedKeys>, LockboxError> {
        let verifier = store
            .load_key()
            .await?
            .ok_or(LockboxError::NotInitialized)?;
        // Stores created before crypto info existed fall back to the configured cost.
        let params = store
            .fetch_crypto_info()
            .await?
            .map(|info| info.kdf)
            .unwrap_or(self.params);

        let keys =
            kdf::derive_keys(password.expose_secret().as_bytes(), &verifier.salt, &params)?;
        Ok(matches_verifier(&keys, &verifier).then_some(keys))
    }

    fn active(&self) -> Result<&DerivedKeys, LockboxError> {
        self.key.as_ref().ok_or(LockboxError::NotAuthenticated)
    }

    fn activate(&mut self, keys: DerivedKeys) {
        if let Some(mut old) = self.key.replace(keys) {
            old.zeroize();
        }
    }

    /// Encrypt a field value under the active key with a random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<CipherText, LockboxError> {
        encrypt_with(self.active()?, plaintext)
    }

    /// Encrypt a tag label. Equal labels give equal ciphertext under one key.
    pub fn encrypt_tag(&self, tag: &str) -> Result<CipherText, LockboxError> {
        encrypt_tag_with(self.active()?, tag)
    }

    /// Decrypt a field value or tag under the active key.
    pub fn decrypt(&self, ciphertext: &CipherText) -> Result<String, LockboxError> {
        decrypt_with(self.active()?, ciphertext)
    }

    /// Zeroize and drop the active key. Idempotent.
    pub fn lock(&mut self) {
        if let Some(mut keys) = self.key.take() {
            keys.zeroize();
            debug!("session key zeroized");
        }
    }

    /// Re-key the whole store from `old` to `new` in one atomic batch.
    ///
    /// Nothing is written unless `old` matches the stored verifier and every
    /// field and tag of every node decrypts. On success the new key is active
    /// and the old one zeroized. On failure the store and the session are
    /// exactly as they were.
    pub async fn change_password(
        &mut self,
        store: &dyn StorageBackend,
        old: &SecretString,
        new: &SecretString,
    ) -> Result<(), LockboxError> {
        self.active()?;

        let old_keys = self
            .derive_against_stored(store, old)
            .await?
            .ok_or(LockboxError::BadCurrentPassword)?;

        let salt = kdf::generate_salt()?;
        let new_keys = kdf::derive_keys(new.expose_secret().as_bytes(), &salt, &self.params)?;

        let ids = store.list_nodes(None).await?;
        let nodes = store.get_nodes(&ids).await?;

        let mut ops = Vec::with_capacity(nodes.len() + 2);
        for node in nodes {
            let fields = SealedFields {
                username: reseal_field(&old_keys, &new_keys, &node.fields.username)?,
                password: reseal_field(&old_keys, &new_keys, &node.fields.password)?,
                url: reseal_field(&old_keys, &new_keys, &node.fields.url)?,
                notes: reseal_field(&old_keys, &new_keys, &node.fields.notes)?,
            };
            let tags = node
                .tags
                .iter()
                .map(|tag| reseal_tag(&old_keys, &new_keys, tag))
                .collect::<Result<Vec<_>, _>>()
                .inspect_err(|_| warn!(node_id = %node.id, "tag failed to decrypt, aborting"))?;
            ops.push(WriteOp::ReplaceNode {
                id: node.id,
                node: SealedNode { fields, tags },
            });
        }
        let node_count = ops.len();

        ops.push(WriteOp::SaveKey(Verifier {
            salt: salt.to_vec(),
            check: check_value(&new_keys),
        }));
        ops.push(WriteOp::SaveCryptoInfo(CryptoInfo {
            algorithm: ALGORITHM.to_string(),
            kdf: self.params,
        }));

        store.run_atomic(ops).await?;

        self.activate(new_keys);
        info!(nodes = node_count, "master password changed");
        Ok(())
    }
}

impl Drop for CryptoEngine {
    fn drop(&mut self) {
        self.lock();
    }
}
