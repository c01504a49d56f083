// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forward-only schema migration.
//!
//! Each step upgrades the store by exactly one version and commits as one
//! atomic batch: the rewritten node layout plus the new version marker. A
//! failed step leaves the store at the version it started from.

use lockbox_core::{
    LegacyNode, LockboxError, SchemaVersion, StorageBackend, StoredNode, WriteOp,
};
use lockbox_crypto::CryptoEngine;
use tracing::info;

use crate::record::parse_packed;

/// Upgrades stores to [`SchemaVersion::CURRENT`].
///
/// Borrows the session engine because the first step (packed blobs to
/// per-field ciphertext) has to decrypt and re-encrypt. Later steps are
/// key-free.
pub struct SchemaMigrator<'a> {
    engine: &'a CryptoEngine,
}

impl<'a> SchemaMigrator<'a> {
    pub fn new(engine: &'a CryptoEngine) -> Self {
        Self { engine }
    }

    /// The version marker persisted in `store`.
    pub async fn current_version(
        &self,
        store: &dyn StorageBackend,
    ) -> Result<SchemaVersion, LockboxError> {
        store.schema_version().await
    }

    /// Upgrade `store` from `from` to the current version, one step at a time.
    ///
    /// A no-op at the current version. Unknown and newer versions are refused
    /// without touching the store.
    pub async fn migrate(
        &self,
        store: &dyn StorageBackend,
        from: SchemaVersion,
    ) -> Result<SchemaVersion, LockboxError> {
        if !from.is_known() {
            return Err(LockboxError::UnsupportedSchemaVersion {
                found: from,
                supported: SchemaVersion::CURRENT,
            });
        }
        if from == SchemaVersion::CURRENT {
            return Ok(from);
        }

        let stored = store.schema_version().await?;
        if stored != from {
            return Err(LockboxError::Internal(format!(
                "asked to migrate from version {from} but the store is at {stored}"
            )));
        }

        let mut version = from;
        while version < SchemaVersion::CURRENT {
            let target = version.next();
            let nodes = match version {
                SchemaVersion::PACKED => self.unpack(store).await?,
                SchemaVersion::INLINE_TAGS => normalize_tags(store).await?,
                other => {
                    return Err(LockboxError::UnsupportedSchemaVersion {
                        found: other,
                        supported: SchemaVersion::CURRENT,
                    });
                }
            };
            let count = nodes.len();

            store
                .run_atomic(vec![
                    WriteOp::RewriteLayout { target, nodes },
                    WriteOp::SetSchemaVersion(target),
                ])
                .await?;
            info!(backend = %store.name(), from = %version, to = %target, nodes = count, "schema migrated");
            version = target;
        }
        Ok(version)
    }

    /// v1 to v2: decrypt each packed blob and seal its fields one by one.
    async fn unpack(&self, store: &dyn StorageBackend) -> Result<Vec<StoredNode>, LockboxError> {
        if !self.engine.is_authenticated() {
            return Err(LockboxError::NotAuthenticated);
        }
        store
            .read_legacy(SchemaVersion::PACKED)
            .await?
            .into_iter()
            .map(|legacy| match legacy {
                LegacyNode::Packed { id, blob } => {
                    let text = zeroize::Zeroizing::new(self.engine.decrypt(&blob)?);
                    let sealed = parse_packed(id, &text)?.seal(self.engine)?;
                    Ok(StoredNode {
                        id,
                        fields: sealed.fields,
                        tags: sealed.tags,
                    })
                }
                LegacyNode::Inline(node) => Err(LockboxError::Corrupted(format!(
                    "node {} is not in the packed layout",
                    node.id
                ))),
            })
            .collect()
    }
}

/// v2 to v3: drop repeated tags per node so each link is unique.
async fn normalize_tags(store: &dyn StorageBackend) -> Result<Vec<StoredNode>, LockboxError> {
    store
        .read_legacy(SchemaVersion::INLINE_TAGS)
        .await?
        .into_iter()
        .map(|legacy| match legacy {
            LegacyNode::Inline(mut node) => {
                let mut seen = std::collections::BTreeSet::new();
                node.tags.retain(|tag| seen.insert(tag.clone()));
                Ok(node)
            }
            LegacyNode::Packed { id, .. } => Err(LockboxError::Corrupted(format!(
                "node {id} is not in the inline-tag layout"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_core::{CipherText, KdfParams, NodeId, SealedFields};
    use lockbox_storage::DocumentBackend;
    use lockbox_storage::document::{Document, NodeEntry, write_document};
    use tracing_test::traced_test;

    const PARAMS: KdfParams = KdfParams {
        memory_cost: 32768,
        iterations: 2,
        parallelism: 1,
    };

    fn ct(s: &str) -> CipherText {
        CipherText::from_encoded(s)
    }

    async fn inline_store(dir: &std::path::Path) -> DocumentBackend {
        let path = dir.join("v2.json");
        let mut doc = Document::empty_at(SchemaVersion::INLINE_TAGS);
        doc.nodes.push(NodeEntry {
            id: NodeId(1),
            fields: SealedFields {
                username: ct("dQ=="),
                password: ct("cA=="),
                url: ct("dQ=="),
                notes: ct("bg=="),
            },
            tags: vec![ct("dA=="), ct("dA==")],
        });
        write_document(&path, &doc).await.unwrap();
        let store = DocumentBackend::new(path);
        store.open().await.unwrap();
        store
    }

    #[tokio::test]
    async fn current_version_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentBackend::new(dir.path().join("v3.json"));
        store.open().await.unwrap();
        let engine = CryptoEngine::new(PARAMS);
        let migrator = SchemaMigrator::new(&engine);

        let to = migrator.migrate(&store, SchemaVersion::CURRENT).await.unwrap();
        assert_eq!(to, SchemaVersion::CURRENT);
        assert_eq!(migrator.current_version(&store).await.unwrap(), SchemaVersion::CURRENT);
    }

    #[tokio::test]
    async fn unknown_versions_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentBackend::new(dir.path().join("v3.json"));
        store.open().await.unwrap();
        let engine = CryptoEngine::new(PARAMS);
        let migrator = SchemaMigrator::new(&engine);

        for version in [SchemaVersion(0), SchemaVersion::CURRENT.next()] {
            assert!(matches!(
                migrator.migrate(&store, version).await,
                Err(LockboxError::UnsupportedSchemaVersion { found, .. }) if found == version
            ));
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn key_free_step_runs_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let store = inline_store(dir.path()).await;
        let engine = CryptoEngine::new(PARAMS);
        let migrator = SchemaMigrator::new(&engine);

        let to = migrator
            .migrate(&store, SchemaVersion::INLINE_TAGS)
            .await
            .unwrap();

        assert_eq!(to, SchemaVersion::CURRENT);
        assert_eq!(store.get_nodes(&[NodeId(1)]).await.unwrap()[0].tags, vec![ct("dA==")]);
        assert!(logs_contain("schema migrated"));
    }

    #[tokio::test]
    async fn packed_step_needs_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.json");
        write_document(&path, &Document::empty_at(SchemaVersion::PACKED))
            .await
            .unwrap();
        let store = DocumentBackend::new(path);
        store.open().await.unwrap();
        let engine = CryptoEngine::new(PARAMS);

        assert!(matches!(
            SchemaMigrator::new(&engine)
                .migrate(&store, SchemaVersion::PACKED)
                .await,
            Err(LockboxError::NotAuthenticated)
        ));
        assert_eq!(store.schema_version().await.unwrap(), SchemaVersion::PACKED);
    }

    #[tokio::test]
    async fn mismatched_starting_version_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = inline_store(dir.path()).await;
        let engine = CryptoEngine::new(PARAMS);

        assert!(
            SchemaMigrator::new(&engine)
                .migrate(&store, SchemaVersion::PACKED)
                .await
                .is_err()
        );
        assert_eq!(store.schema_version().await.unwrap(), SchemaVersion::INLINE_TAGS);
    }
}
