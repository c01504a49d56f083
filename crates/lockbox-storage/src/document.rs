// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON document implementation of the StorageBackend trait.
//!
//! The whole store is one JSON document held in memory and rewritten on
//! every change (write to a temp file, then rename). Tags are embedded in
//! each node and also kept in a top-level collection with a reference count;
//! a tag whose count reaches zero is dropped from the collection.
//!
//! Every write is applied to a copy of the document and only swapped in once
//! the file is on disk, so a failed write leaves both memory and disk on the
//! previous state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use lockbox_core::{
    CipherText, CryptoInfo, LegacyNode, LockboxError, NodeId, SchemaVersion, SealedFields,
    SealedNode, StorageBackend, StoredNode, Verifier, WriteOp,
};

use crate::{check_batch, known_gate, version_gate};

const BACKEND_NAME: &str = "document";

/// On-disk shape of the store. Which node collection is populated depends on
/// `version`: `packed` for v1, `nodes` for v2 and v3, `tags` for v3 only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub version: SchemaVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_info: Option<CryptoInfo>,
    #[serde(default = "first_id")]
    pub next_id: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packed: Vec<PackedEntry>,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagEntry>,
}

fn first_id() -> i64 {
    1
}

/// A v1 node: one packed ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackedEntry {
    pub id: NodeId,
    pub data: CipherText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    #[serde(flatten)]
    pub fields: SealedFields,
    #[serde(default)]
    pub tags: Vec<CipherText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagEntry {
    pub data: CipherText,
    pub refs: u32,
}

/// Tag list with repeats removed, first occurrence kept.
fn unique_tags(tags: &[CipherText]) -> Vec<CipherText> {
    let mut seen = BTreeSet::new();
    tags.iter()
        .filter(|tag| seen.insert((*tag).clone()))
        .cloned()
        .collect()
}

impl Document {
    /// An empty store at the current layout.
    pub fn empty() -> Self {
        Self::empty_at(SchemaVersion::CURRENT)
    }

    /// An empty store at `version`. Used to build legacy fixtures.
    pub fn empty_at(version: SchemaVersion) -> Self {
        Self {
            version,
            verifier: None,
            crypto_info: None,
            next_id: first_id(),
            packed: Vec::new(),
            nodes: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn incref(&mut self, tag: &CipherText) {
        match self.tags.iter_mut().find(|t| &t.data == tag) {
            Some(entry) => entry.refs += 1,
            None => self.tags.push(TagEntry {
                data: tag.clone(),
                refs: 1,
            }),
        }
    }

    fn decref(&mut self, tag: &CipherText) {
        if let Some(entry) = self.tags.iter_mut().find(|t| &t.data == tag) {
            entry.refs = entry.refs.saturating_sub(1);
        }
        self.tags.retain(|t| t.refs > 0);
    }

    fn add(&mut self, node: &SealedNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let tags = unique_tags(&node.tags);
        for tag in &tags {
            self.incref(tag);
        }
        self.nodes.push(NodeEntry {
            id,
            fields: node.fields.clone(),
            tags,
        });
        id
    }

    fn replace(&mut self, id: NodeId, node: &SealedNode) -> bool {
        let Some(index) = self.nodes.iter().position(|n| n.id == id) else {
            return false;
        };
        let tags = unique_tags(&node.tags);
        for tag in &tags {
            self.incref(tag);
        }
        let old = std::mem::take(&mut self.nodes[index].tags);
        for tag in &old {
            self.decref(tag);
        }
        self.nodes[index].fields = node.fields.clone();
        self.nodes[index].tags = tags;
        true
    }

    fn remove(&mut self, ids: &[NodeId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if let Some(index) = self.nodes.iter().position(|n| n.id == *id) {
                let node = self.nodes.remove(index);
                for tag in &node.tags {
                    self.decref(tag);
                }
                removed += 1;
            }
        }
        removed
    }

    fn stored(&self, id: NodeId) -> Option<StoredNode> {
        self.nodes.iter().find(|n| n.id == id).map(|n| StoredNode {
            id: n.id,
            fields: n.fields.clone(),
            tags: n.tags.clone(),
        })
    }

    fn list(&self, tag: Option<&CipherText>) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| tag.is_none_or(|tag| n.tags.contains(tag)))
            .map(|n| n.id)
            .collect();
        ids.sort();
        ids
    }

    fn rewrite(&mut self, target: SchemaVersion, stored: &[StoredNode]) {
        self.packed.clear();
        self.tags.clear();
        self.nodes.clear();
        for node in stored {
            let tags = if target == SchemaVersion::NORMALIZED_TAGS {
                let tags = unique_tags(&node.tags);
                for tag in &tags {
                    self.incref(tag);
                }
                tags
            } else {
                node.tags.clone()
            };
            self.nodes.push(NodeEntry {
                id: node.id,
                fields: node.fields.clone(),
                tags,
            });
            self.next_id = self.next_id.max(node.id.0 + 1);
        }
    }

    fn apply(&mut self, op: &WriteOp) -> Result<(), LockboxError> {
        match op {
            WriteOp::ReplaceNode { id, node } => {
                if !self.replace(*id, node) {
                    return Err(LockboxError::NodeNotFound(*id));
                }
            }
            WriteOp::SaveKey(verifier) => self.verifier = Some(verifier.encode()),
            WriteOp::SaveCryptoInfo(info) => self.crypto_info = Some(info.clone()),
            WriteOp::RewriteLayout { target, nodes } => self.rewrite(*target, nodes),
            WriteOp::SetSchemaVersion(version) => self.version = *version,
        }
        Ok(())
    }

    fn legacy(&self, version: SchemaVersion) -> Result<Vec<LegacyNode>, LockboxError> {
        match version {
            SchemaVersion::PACKED => Ok(self
                .packed
                .iter()
                .map(|p| LegacyNode::Packed {
                    id: p.id,
                    blob: p.data.clone(),
                })
                .collect()),
            SchemaVersion::INLINE_TAGS => Ok(self
                .nodes
                .iter()
                .map(|n| {
                    LegacyNode::Inline(StoredNode {
                        id: n.id,
                        fields: n.fields.clone(),
                        tags: n.tags.clone(),
                    })
                })
                .collect()),
            _ => Err(LockboxError::UnsupportedSchemaVersion {
                found: version,
                supported: SchemaVersion::CURRENT,
            }),
        }
    }
}

/// Write `doc` to `path` atomically: temp file in the same directory, then rename.
pub async fn write_document(path: &Path, doc: &Document) -> Result<(), LockboxError> {
    let data = serde_json::to_vec_pretty(doc).map_err(LockboxError::storage)?;

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(LockboxError::storage)?;
    file.write_all(&data).await.map_err(LockboxError::storage)?;
    file.sync_all().await.map_err(LockboxError::storage)?;

    // Owner-only access on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&temp_path, perms)
            .await
            .map_err(LockboxError::storage)?;
    }

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(LockboxError::storage)?;
    Ok(())
}

/// Document-oriented backend over a single JSON file.
pub struct DocumentBackend {
    path: PathBuf,
    doc: Mutex<Option<Document>>,
}

impl DocumentBackend {
    /// Create a backend for the document at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            doc: Mutex::new(None),
        }
    }

    fn not_open() -> LockboxError {
        LockboxError::Storage {
            source: "document backend not open -- call open() first".into(),
        }
    }

    /// Run a read against the open document.
    async fn read<T>(
        &self,
        f: impl FnOnce(&Document) -> Result<T, LockboxError> + Send,
    ) -> Result<T, LockboxError> {
        let guard = self.doc.lock().await;
        let doc = guard.as_ref().ok_or_else(Self::not_open)?;
        f(doc)
    }

    /// Apply `f` to a copy of the document, persist the copy, then swap it in.
    async fn commit<T>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<T, LockboxError> + Send,
    ) -> Result<T, LockboxError> {
        let mut guard = self.doc.lock().await;
        let mut next = guard.as_ref().ok_or_else(Self::not_open)?.clone();
        let out = f(&mut next)?;
        write_document(&self.path, &next).await?;
        *guard = Some(next);
        Ok(out)
    }
}

#[async_trait]
impl StorageBackend for DocumentBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn open(&self) -> Result<(), LockboxError> {
        let mut guard = self.doc.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let doc = match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice::<Document>(&bytes)
                .map_err(|e| LockboxError::unavailable(BACKEND_NAME, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = self.path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| LockboxError::unavailable(BACKEND_NAME, e))?;
                }
                let doc = Document::empty();
                write_document(&self.path, &doc).await.map_err(|e| match e {
                    LockboxError::Storage { source } => LockboxError::StorageUnavailable {
                        backend: BACKEND_NAME.to_string(),
                        source,
                    },
                    other => other,
                })?;
                doc
            }
            Err(e) => return Err(LockboxError::unavailable(BACKEND_NAME, e)),
        };

        info!(path = %self.path.display(), version = %doc.version, "document store opened");
        *guard = Some(doc);
        Ok(())
    }

    async fn close(&self) -> Result<(), LockboxError> {
        if self.doc.lock().await.take().is_some() {
            debug!(path = %self.path.display(), "document store closed");
        }
        Ok(())
    }

    async fn schema_version(&self) -> Result<SchemaVersion, LockboxError> {
        self.read(|doc| Ok(doc.version)).await
    }

    async fn add_node(&self, node: &SealedNode) -> Result<NodeId, LockboxError> {
        let id = self
            .commit(|doc| {
                version_gate(doc.version)?;
                Ok(doc.add(node))
            })
            .await?;
        debug!(node_id = %id, "node added");
        Ok(id)
    }

    async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<StoredNode>, LockboxError> {
        self.read(|doc| {
            version_gate(doc.version)?;
            Ok(ids.iter().filter_map(|id| doc.stored(*id)).collect())
        })
        .await
    }

    async fn list_nodes(&self, tag: Option<&CipherText>) -> Result<Vec<NodeId>, LockboxError> {
        self.read(|doc| {
            version_gate(doc.version)?;
            Ok(doc.list(tag))
        })
        .await
    }

    async fn edit_node(&self, id: NodeId, node: &SealedNode) -> Result<(), LockboxError> {
        self.commit(|doc| {
            version_gate(doc.version)?;
            if doc.replace(id, node) {
                Ok(())
            } else {
                Err(LockboxError::NodeNotFound(id))
            }
        })
        .await?;
        debug!(node_id = %id, "node edited");
        Ok(())
    }

    async fn remove_nodes(&self, ids: &[NodeId]) -> Result<(), LockboxError> {
        let removed = self
            .commit(|doc| {
                version_gate(doc.version)?;
                Ok(doc.remove(ids))
            })
            .await?;
        debug!(removed, "nodes removed");
        Ok(())
    }

    async fn list_tags(&self) -> Result<BTreeSet<CipherText>, LockboxError> {
        self.read(|doc| {
            version_gate(doc.version)?;
            Ok(doc.tags.iter().map(|t| t.data.clone()).collect())
        })
        .await
    }

    async fn save_key(&self, verifier: &Verifier) -> Result<(), LockboxError> {
        self.commit(|doc| {
            known_gate(doc.version)?;
            doc.verifier = Some(verifier.encode());
            Ok(())
        })
        .await
    }

    async fn load_key(&self) -> Result<Option<Verifier>, LockboxError> {
        self.read(|doc| {
            known_gate(doc.version)?;
            doc.verifier.as_deref().map(Verifier::decode).transpose()
        })
        .await
    }

    async fn save_crypto_info(&self, info: &CryptoInfo) -> Result<(), LockboxError> {
        self.commit(|doc| {
            known_gate(doc.version)?;
            doc.crypto_info = Some(info.clone());
            Ok(())
        })
        .await
    }

    async fn fetch_crypto_info(&self) -> Result<Option<CryptoInfo>, LockboxError> {
        self.read(|doc| {
            known_gate(doc.version)?;
            Ok(doc.crypto_info.clone())
        })
        .await
    }

    async fn run_atomic(&self, ops: Vec<WriteOp>) -> Result<(), LockboxError> {
        let op_count = ops.len();
        self.commit(|doc| {
            check_batch(&ops, doc.version)?;
            for op in &ops {
                doc.apply(op)?;
            }
            Ok(())
        })
        .await?;
        debug!(ops = op_count, "atomic batch committed");
        Ok(())
    }

    async fn read_legacy(&self, version: SchemaVersion) -> Result<Vec<LegacyNode>, LockboxError> {
        self.read(|doc| {
            if doc.version != version {
                return Err(LockboxError::Internal(format!(
                    "cannot read layout {version} from a store at version {}",
                    doc.version
                )));
            }
            doc.legacy(version)
        })
        .await
    }
}
