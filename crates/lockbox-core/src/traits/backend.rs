// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The capability interface every persistence engine implements.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::LockboxError;
use crate::types::{
    CipherText, CryptoInfo, LegacyNode, NodeId, SchemaVersion, SealedNode, StoredNode, Verifier,
    WriteOp,
};

/// A storage backend for sealed nodes, de-duplicated tags, and key material.
///
/// Backends only ever see ciphertext. Invariants every implementation keeps,
/// whatever its internal shape (join tables, embedded arrays with reference
/// counts, ...):
///
/// - equal tag ciphertext maps to exactly one stored tag identity;
/// - a tag with no referencing node never persists past the call that
///   orphaned it;
/// - `run_atomic` applies every op or none.
///
/// Backends are opened lazily: construct, then call [`StorageBackend::open`].
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Human-readable backend name, used in logs and errors.
    fn name(&self) -> &str;

    /// Acquire the underlying storage handle, creating an empty store at
    /// [`SchemaVersion::CURRENT`] if none exists.
    async fn open(&self) -> Result<(), LockboxError>;

    /// Flush and release the storage handle.
    async fn close(&self) -> Result<(), LockboxError>;

    /// The persisted schema version marker. Readable before any node is touched.
    async fn schema_version(&self) -> Result<SchemaVersion, LockboxError>;

    /// Insert a node, resolving or creating each tag. Returns the new id.
    async fn add_node(&self, node: &SealedNode) -> Result<NodeId, LockboxError>;

    /// Fetch nodes in request order. Unknown ids are skipped.
    async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<StoredNode>, LockboxError>;

    /// All node ids, or only those linked to the tag whose ciphertext equals `tag`.
    async fn list_nodes(&self, tag: Option<&CipherText>) -> Result<Vec<NodeId>, LockboxError>;

    /// Replace a node's fields and tag linkage.
    async fn edit_node(&self, id: NodeId, node: &SealedNode) -> Result<(), LockboxError>;

    /// Delete nodes and every tag left without a referencing node.
    async fn remove_nodes(&self, ids: &[NodeId]) -> Result<(), LockboxError>;

    /// Every tag currently linked to at least one node.
    async fn list_tags(&self) -> Result<BTreeSet<CipherText>, LockboxError>;

    async fn save_key(&self, verifier: &Verifier) -> Result<(), LockboxError>;

    /// `None` when no master password has been set yet.
    async fn load_key(&self) -> Result<Option<Verifier>, LockboxError>;

    async fn save_crypto_info(&self, info: &CryptoInfo) -> Result<(), LockboxError>;

    async fn fetch_crypto_info(&self) -> Result<Option<CryptoInfo>, LockboxError>;

    /// Apply a batch of writes so that either all of them are durable or none is.
    async fn run_atomic(&self, ops: Vec<WriteOp>) -> Result<(), LockboxError>;

    /// Decode every node stored in the given pre-current layout.
    async fn read_legacy(&self, version: SchemaVersion) -> Result<Vec<LegacyNode>, LockboxError>;
}
