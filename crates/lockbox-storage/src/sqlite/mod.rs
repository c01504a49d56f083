// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageBackend trait.
//!
//! All statements run on tokio-rusqlite's single background thread. Tags are
//! de-duplicated by a `UNIQUE` column and linked through the `lookup` join
//! table; orphaned tags are deleted in the same call that orphans them.

mod nodes;
pub mod schema;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use lockbox_core::{
    CipherText, CryptoInfo, LegacyNode, LockboxError, NodeId, SchemaVersion, SealedNode,
    StorageBackend, StoredNode, Verifier, WriteOp,
};

use crate::{known_gate, version_gate};

const BACKEND_NAME: &str = "sqlite";

fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> LockboxError {
    LockboxError::storage(e)
}

/// Relational backend over a single SQLite file.
///
/// The connection is opened by [`StorageBackend::open`] and released by
/// [`StorageBackend::close`]. The schema version is cached at open and
/// refreshed whenever a batch writes a new one.
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    version: AtomicU32,
}

impl SqliteBackend {
    /// Create a backend for the database at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(None),
            version: AtomicU32::new(0),
        }
    }

    async fn conn(&self) -> Result<Connection, LockboxError> {
        self.conn.lock().await.clone().ok_or_else(|| LockboxError::Storage {
            source: "sqlite backend not open -- call open() first".into(),
        })
    }

    /// Connection for key material, which any known layout can hold.
    async fn meta_conn(&self) -> Result<Connection, LockboxError> {
        let conn = self.conn().await?;
        known_gate(SchemaVersion(self.version.load(Ordering::Acquire)))?;
        Ok(conn)
    }

    /// Connection for node and tag operations, which need the current layout.
    async fn current_conn(&self) -> Result<Connection, LockboxError> {
        let conn = self.conn().await?;
        version_gate(SchemaVersion(self.version.load(Ordering::Acquire)))?;
        Ok(conn)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn open(&self) -> Result<(), LockboxError> {
        let mut guard = self.conn.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LockboxError::unavailable(BACKEND_NAME, e))?;
        }

        let conn = Connection::open(&self.path)
            .await
            .map_err(|e| LockboxError::unavailable(BACKEND_NAME, e))?;
        let version = conn
            .call(|conn| -> Result<SchemaVersion, rusqlite::Error> {
                conn.pragma_update(None, "foreign_keys", "ON")?;
                schema::bootstrap(conn)
            })
            .await
            .map_err(|e| LockboxError::unavailable(BACKEND_NAME, e))?;

        self.version.store(version.0, Ordering::Release);
        *guard = Some(conn);
        info!(path = %self.path.display(), version = %version, "sqlite store opened");
        Ok(())
    }

    async fn close(&self) -> Result<(), LockboxError> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        conn.close().await.map_err(LockboxError::storage)?;
        debug!(path = %self.path.display(), "sqlite store closed");
        Ok(())
    }

    async fn schema_version(&self) -> Result<SchemaVersion, LockboxError> {
        self.conn().await?;
        Ok(SchemaVersion(self.version.load(Ordering::Acquire)))
    }

    async fn add_node(&self, node: &SealedNode) -> Result<NodeId, LockboxError> {
        let node = node.clone();
        let id = self
            .current_conn()
            .await?
            .call(move |conn| -> Result<NodeId, rusqlite::Error> {
                let tx = conn.transaction()?;
                let id = nodes::add_node(&tx, &node)?;
                tx.commit()?;
                Ok(id)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(node_id = %id, "node added");
        Ok(id)
    }

    async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<StoredNode>, LockboxError> {
        let ids = ids.to_vec();
        self.current_conn()
            .await?
            .call(move |conn| -> Result<Vec<StoredNode>, rusqlite::Error> {
                let mut found = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(node) = nodes::get_node(conn, id)? {
                        found.push(node);
                    }
                }
                Ok(found)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn list_nodes(&self, tag: Option<&CipherText>) -> Result<Vec<NodeId>, LockboxError> {
        let tag = tag.map(|t| t.as_str().to_string());
        self.current_conn()
            .await?
            .call(move |conn| -> Result<Vec<NodeId>, rusqlite::Error> {
                nodes::list_ids(conn, tag.as_deref())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn edit_node(&self, id: NodeId, node: &SealedNode) -> Result<(), LockboxError> {
        let node = node.clone();
        let replaced = self
            .current_conn()
            .await?
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction()?;
                let replaced = nodes::replace_node(&tx, id, &node)?;
                if replaced {
                    tx.commit()?;
                }
                Ok(replaced)
            })
            .await
            .map_err(map_tr_err)?;
        if !replaced {
            return Err(LockboxError::NodeNotFound(id));
        }
        debug!(node_id = %id, "node edited");
        Ok(())
    }

    async fn remove_nodes(&self, ids: &[NodeId]) -> Result<(), LockboxError> {
        let ids = ids.to_vec();
        let removed = self
            .current_conn()
            .await?
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                let tx = conn.transaction()?;
                let removed = nodes::delete_nodes(&tx, &ids)?;
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(removed, "nodes removed");
        Ok(())
    }

    async fn list_tags(&self) -> Result<BTreeSet<CipherText>, LockboxError> {
        self.current_conn()
            .await?
            .call(|conn| -> Result<BTreeSet<CipherText>, rusqlite::Error> { nodes::list_tags(conn) })
            .await
            .map_err(map_tr_err)
    }

    async fn save_key(&self, verifier: &Verifier) -> Result<(), LockboxError> {
        let encoded = verifier.encode();
        self.meta_conn()
            .await?
            .call(move |conn| -> Result<(), rusqlite::Error> {
                nodes::put_meta(conn, nodes::KEY_VERIFIER, &encoded)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn load_key(&self) -> Result<Option<Verifier>, LockboxError> {
        let encoded = self
            .meta_conn()
            .await?
            .call(|conn| -> Result<Option<String>, rusqlite::Error> {
                nodes::get_meta(conn, nodes::KEY_VERIFIER)
            })
            .await
            .map_err(map_tr_err)?;
        encoded.as_deref().map(Verifier::decode).transpose()
    }

    async fn save_crypto_info(&self, info: &CryptoInfo) -> Result<(), LockboxError> {
        let json = info.to_json()?;
        self.meta_conn()
            .await?
            .call(move |conn| -> Result<(), rusqlite::Error> {
                nodes::put_meta(conn, nodes::KEY_CRYPTO_INFO, &json)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn fetch_crypto_info(&self) -> Result<Option<CryptoInfo>, LockboxError> {
        let json = self
            .meta_conn()
            .await?
            .call(|conn| -> Result<Option<String>, rusqlite::Error> {
                nodes::get_meta(conn, nodes::KEY_CRYPTO_INFO)
            })
            .await
            .map_err(map_tr_err)?;
        json.as_deref().map(CryptoInfo::from_json).transpose()
    }

    async fn run_atomic(&self, ops: Vec<WriteOp>) -> Result<(), LockboxError> {
        let conn = self.conn().await?;
        let new_version =
            crate::check_batch(&ops, SchemaVersion(self.version.load(Ordering::Acquire)))?;
        let crypto_json = ops
            .iter()
            .rev()
            .find_map(|op| match op {
                WriteOp::SaveCryptoInfo(info) => Some(info),
                _ => None,
            })
            .map(CryptoInfo::to_json)
            .transpose()?;
        let op_count = ops.len();

        let missing = conn
            .call(move |conn| -> Result<Option<NodeId>, rusqlite::Error> {
                let tx = conn.transaction()?;
                for op in &ops {
                    match op {
                        WriteOp::ReplaceNode { id, node } => {
                            if !nodes::replace_node(&tx, *id, node)? {
                                // Dropping the transaction rolls back every earlier op.
                                return Ok(Some(*id));
                            }
                        }
                        WriteOp::SaveKey(verifier) => {
                            nodes::put_meta(&tx, nodes::KEY_VERIFIER, &verifier.encode())?;
                        }
                        WriteOp::SaveCryptoInfo(_) => {}
                        WriteOp::RewriteLayout { target, nodes: stored } => {
                            schema::rewrite_layout(&tx, *target, stored)?;
                        }
                        WriteOp::SetSchemaVersion(version) => {
                            schema::write_version(&tx, *version)?;
                        }
                    }
                }
                if let Some(json) = &crypto_json {
                    nodes::put_meta(&tx, nodes::KEY_CRYPTO_INFO, json)?;
                }
                tx.commit()?;
                Ok(None)
            })
            .await
            .map_err(map_tr_err)?;

        if let Some(id) = missing {
            return Err(LockboxError::NodeNotFound(id));
        }
        if let Some(version) = new_version {
            self.version.store(version.0, Ordering::Release);
        }
        debug!(ops = op_count, "atomic batch committed");
        Ok(())
    }

    async fn read_legacy(&self, version: SchemaVersion) -> Result<Vec<LegacyNode>, LockboxError> {
        let conn = self.conn().await?;
        let stored = SchemaVersion(self.version.load(Ordering::Acquire));
        if stored != version {
            return Err(LockboxError::Internal(format!(
                "cannot read layout {version} from a store at version {stored}"
            )));
        }
        match version {
            SchemaVersion::PACKED => conn
                .call(|conn| -> Result<Vec<LegacyNode>, rusqlite::Error> { nodes::read_packed(conn) })
                .await
                .map_err(map_tr_err),
            SchemaVersion::INLINE_TAGS => conn
                .call(|conn| -> Result<Vec<LegacyNode>, rusqlite::Error> { nodes::read_inline(conn) })
                .await
                .map_err(map_tr_err),
            _ => Err(LockboxError::UnsupportedSchemaVersion {
                found: version,
                supported: SchemaVersion::CURRENT,
            }),
        }
    }
}
