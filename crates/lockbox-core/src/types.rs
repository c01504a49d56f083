// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record shapes shared by the crypto engine, the storage backends, and the
//! schema migrator.
//!
//! Everything here is ciphertext-at-rest: none of these types ever hold a
//! plaintext credential field.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LockboxError;

/// Backend-assigned identifier of a stored node. Stable across edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-disk format revision of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    /// Each node is a single ciphertext of a packed text record.
    pub const PACKED: Self = Self(1);
    /// Per-field ciphertext, tags stored inline on the node.
    pub const INLINE_TAGS: Self = Self(2);
    /// Per-field ciphertext, tags de-duplicated in their own table/collection.
    pub const NORMALIZED_TAGS: Self = Self(3);
    /// The layout this build reads and writes for normal operation.
    pub const CURRENT: Self = Self::NORMALIZED_TAGS;

    /// The version one step after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Whether this build knows how to read (and migrate from) this version.
    pub fn is_known(self) -> bool {
        self >= Self::PACKED && self <= Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a storage backend family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Relational store backed by a single SQLite file.
    Sqlite,
    /// Document store backed by a single JSON file.
    Document,
}

impl BackendKind {
    /// File name used when no `path` is configured.
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Sqlite => "lockbox.db",
            Self::Document => "lockbox.json",
        }
    }
}

/// An encrypted field value, in its base64 text form.
///
/// Produced only by the crypto engine. Backends store and compare it as an
/// opaque string; decoding happens only inside the engine, so a malformed
/// value surfaces as a decryption failure rather than a storage error.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherText(String);

impl CipherText {
    /// Encode raw `nonce || ciphertext || tag` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    /// Wrap an already-encoded value read back from storage.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The stored text form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode to raw bytes. `None` if the stored text is not valid base64.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        STANDARD.decode(self.0.as_bytes()).ok()
    }
}

impl fmt::Debug for CipherText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherText({} chars)", self.0.len())
    }
}

/// The four scalar credential fields, each encrypted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedFields {
    pub username: CipherText,
    pub password: CipherText,
    pub url: CipherText,
    pub notes: CipherText,
}

/// A node as handed to a backend for insertion or replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedNode {
    pub fields: SealedFields,
    /// Deterministic tag ciphertexts. Backends de-duplicate on equality.
    pub tags: Vec<CipherText>,
}

/// A node as read back from a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    pub id: NodeId,
    pub fields: SealedFields,
    pub tags: Vec<CipherText>,
}

impl StoredNode {
    /// Drop the id, keeping the sealed content.
    pub fn into_sealed(self) -> SealedNode {
        SealedNode {
            fields: self.fields,
            tags: self.tags,
        }
    }
}

/// A node decoded from a pre-current layout, for the schema migrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyNode {
    /// Version 1: every field packed into one ciphertext.
    Packed { id: NodeId, blob: CipherText },
    /// Version 2: per-field ciphertext with inline (possibly repeated) tags.
    Inline(StoredNode),
}

impl LegacyNode {
    pub fn id(&self) -> NodeId {
        match self {
            LegacyNode::Packed { id, .. } => *id,
            LegacyNode::Inline(node) => node.id,
        }
    }
}

/// Separator between salt and check value in the verifier text form.
const VERIFIER_SEPARATOR: &str = "$6$";

/// Persisted value used to check a candidate master password without
/// decrypting any node.
#[derive(Clone, PartialEq, Eq)]
pub struct Verifier {
    /// Random KDF salt.
    pub salt: Vec<u8>,
    /// Keyed check value computed from the derived key.
    pub check: Vec<u8>,
}

impl Verifier {
    /// Text form: `<salt-b64>$6$<check-b64>`.
    pub fn encode(&self) -> String {
        format!(
            "{}{VERIFIER_SEPARATOR}{}",
            STANDARD.encode(&self.salt),
            STANDARD.encode(&self.check)
        )
    }

    /// Parse the text form written by [`Verifier::encode`].
    pub fn decode(encoded: &str) -> Result<Self, LockboxError> {
        let (salt, check) = encoded
            .split_once(VERIFIER_SEPARATOR)
            .ok_or_else(|| LockboxError::Corrupted("verifier has no salt separator".into()))?;
        let salt = STANDARD
            .decode(salt)
            .map_err(|e| LockboxError::Corrupted(format!("verifier salt: {e}")))?;
        let check = STANDARD
            .decode(check)
            .map_err(|e| LockboxError::Corrupted(format!("verifier check: {e}")))?;
        if salt.is_empty() || check.is_empty() {
            return Err(LockboxError::Corrupted("verifier has an empty component".into()));
        }
        Ok(Self { salt, check })
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("salt_len", &self.salt.len())
            .field("check", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters used to derive a master key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// Auxiliary key material persisted next to the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoInfo {
    /// Cipher identifier, e.g. `"AES-256-GCM"`.
    pub algorithm: String,
    /// Parameters the active verifier was derived with.
    pub kdf: KdfParams,
}

impl CryptoInfo {
    pub fn to_json(&self) -> Result<String, LockboxError> {
        serde_json::to_string(self).map_err(|e| LockboxError::Internal(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, LockboxError> {
        serde_json::from_str(json).map_err(|e| LockboxError::Corrupted(format!("crypto info: {e}")))
    }
}

/// One write in an atomic batch handed to
/// [`StorageBackend::run_atomic`](crate::traits::StorageBackend::run_atomic).
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Replace an existing node's fields and tag linkage, keeping its id.
    ReplaceNode { id: NodeId, node: SealedNode },
    /// Replace the persisted verifier.
    SaveKey(Verifier),
    /// Replace the persisted auxiliary crypto info.
    SaveCryptoInfo(CryptoInfo),
    /// Drop the current node storage and write `nodes` in the `target`
    /// layout, preserving ids. Used only by the schema migrator.
    RewriteLayout {
        target: SchemaVersion,
        nodes: Vec<StoredNode>,
    },
    /// Record the store's schema version.
    SetSchemaVersion(SchemaVersion),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_text_form_roundtrip() {
        let verifier = Verifier {
            salt: vec![1u8; 16],
            check: vec![7u8; 32],
        };
        let encoded = verifier.encode();
        assert!(encoded.contains("$6$"));
        assert_eq!(Verifier::decode(&encoded).unwrap(), verifier);
    }

    #[test]
    fn verifier_decode_rejects_garbage() {
        assert!(matches!(
            Verifier::decode("no-separator-here"),
            Err(LockboxError::Corrupted(_))
        ));
        assert!(matches!(
            Verifier::decode("$6$AAAA"),
            Err(LockboxError::Corrupted(_))
        ));
        assert!(matches!(
            Verifier::decode("!!!$6$AAAA"),
            Err(LockboxError::Corrupted(_))
        ));
    }

    #[test]
    fn verifier_debug_redacts_check() {
        let verifier = Verifier {
            salt: vec![0u8; 16],
            check: vec![0xAB; 32],
        };
        let debug = format!("{verifier:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("171"));
    }

    #[test]
    fn cipher_text_bytes_roundtrip_and_malformed() {
        let ct = CipherText::from_bytes(&[0, 1, 2, 250]);
        assert_eq!(ct.to_bytes().unwrap(), vec![0, 1, 2, 250]);
        assert!(CipherText::from_encoded("not base64 !!").to_bytes().is_none());
    }

    #[test]
    fn schema_version_ordering() {
        assert!(SchemaVersion::PACKED < SchemaVersion::CURRENT);
        assert_eq!(SchemaVersion::PACKED.next(), SchemaVersion::INLINE_TAGS);
        assert!(SchemaVersion::CURRENT.is_known());
        assert!(!SchemaVersion(0).is_known());
        assert!(!SchemaVersion::CURRENT.next().is_known());
    }

    #[test]
    fn backend_kind_parses_lowercase_identifiers() {
        use std::str::FromStr;

        assert_eq!(BackendKind::from_str("sqlite").unwrap(), BackendKind::Sqlite);
        assert_eq!(BackendKind::from_str("document").unwrap(), BackendKind::Document);
        assert!(BackendKind::from_str("postgres").is_err());
        assert_eq!(BackendKind::Document.to_string(), "document");
    }

    #[test]
    fn crypto_info_json_roundtrip() {
        let info = CryptoInfo {
            algorithm: "AES-256-GCM".into(),
            kdf: KdfParams {
                memory_cost: 65536,
                iterations: 3,
                parallelism: 4,
            },
        };
        let json = info.to_json().unwrap();
        assert_eq!(CryptoInfo::from_json(&json).unwrap(), info);
        assert!(CryptoInfo::from_json("{").is_err());
    }
}
