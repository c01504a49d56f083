// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session facade: one opened store plus the engine that unlocks it.
//!
//! Callers hand in and get back plaintext records only. Everything that
//! reaches the backend has been sealed by the engine owned here.

use lockbox_config::LockboxConfig;
use lockbox_core::{KdfParams, LockboxError, NodeId, SchemaVersion, StorageBackend};
use lockbox_crypto::CryptoEngine;
use lockbox_storage::open_backend;
use secrecy::SecretString;
use tracing::{debug, info};

use crate::migrator::SchemaMigrator;
use crate::record::{NewNode, Node};

/// An opened secret store and its session state.
pub struct Lockbox {
    store: Box<dyn StorageBackend>,
    engine: CryptoEngine,
}

impl std::fmt::Debug for Lockbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lockbox")
            .field("backend", &self.store.name())
            .field("engine", &self.engine)
            .finish()
    }
}

impl Lockbox {
    /// Open the store named by `config.backend`, locked.
    pub async fn open(config: &LockboxConfig) -> Result<Self, LockboxError> {
        let store = open_backend(&config.backend).await?;
        Ok(Self::with_backend(store, config.crypto.kdf_params()))
    }

    /// Wrap an already opened backend.
    pub fn with_backend(store: Box<dyn StorageBackend>, params: KdfParams) -> Self {
        Self {
            store,
            engine: CryptoEngine::new(params),
        }
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.store.as_ref()
    }

    pub fn engine(&self) -> &CryptoEngine {
        &self.engine
    }

    pub fn is_authenticated(&self) -> bool {
        self.engine.is_authenticated()
    }

    pub async fn is_initialized(&self) -> Result<bool, LockboxError> {
        self.engine.is_initialized(self.store.as_ref()).await
    }

    pub async fn schema_version(&self) -> Result<SchemaVersion, LockboxError> {
        SchemaMigrator::new(&self.engine)
            .current_version(self.store.as_ref())
            .await
    }

    /// Set the master password on a new store and unlock it.
    pub async fn initialize(&mut self, password: &SecretString) -> Result<(), LockboxError> {
        self.engine.initialize(self.store.as_ref(), password).await?;
        Ok(())
    }

    /// Unlock with `password`, then bring the store to the current layout.
    ///
    /// Returns `false` for a wrong password, leaving the session locked.
    pub async fn authenticate(&mut self, password: &SecretString) -> Result<bool, LockboxError> {
        if !self.engine.authenticate(self.store.as_ref(), password).await? {
            return Ok(false);
        }
        self.migrate().await?;
        Ok(true)
    }

    /// Run any pending schema migration. A no-op on a current store.
    pub async fn migrate(&self) -> Result<SchemaVersion, LockboxError> {
        let migrator = SchemaMigrator::new(&self.engine);
        let from = migrator.current_version(self.store.as_ref()).await?;
        let to = migrator.migrate(self.store.as_ref(), from).await?;
        if from != to {
            info!(from = %from, to = %to, "store upgraded");
        }
        Ok(to)
    }

    pub fn lock(&mut self) {
        self.engine.lock();
    }

    /// Re-key every record. See [`CryptoEngine::change_password`].
    pub async fn change_password(
        &mut self,
        old: &SecretString,
        new: &SecretString,
    ) -> Result<(), LockboxError> {
        self.engine
            .change_password(self.store.as_ref(), old, new)
            .await
    }

    fn require_auth(&self) -> Result<(), LockboxError> {
        if self.engine.is_authenticated() {
            Ok(())
        } else {
            Err(LockboxError::NotAuthenticated)
        }
    }

    pub async fn add_node(&self, node: &NewNode) -> Result<NodeId, LockboxError> {
        let sealed = node.seal(&self.engine)?;
        self.store.add_node(&sealed).await
    }

    /// Decrypted nodes for `ids`, in request order. Unknown ids are skipped.
    pub async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<Node>, LockboxError> {
        self.require_auth()?;
        self.store
            .get_nodes(ids)
            .await?
            .iter()
            .map(|stored| Node::open(stored, &self.engine))
            .collect()
    }

    /// All node ids, or those carrying `tag`.
    pub async fn list_nodes(&self, tag: Option<&str>) -> Result<Vec<NodeId>, LockboxError> {
        self.require_auth()?;
        let filter = tag
            .map(|tag| self.engine.encrypt_tag(tag.trim()))
            .transpose()?;
        self.store.list_nodes(filter.as_ref()).await
    }

    pub async fn edit_node(&self, id: NodeId, node: &NewNode) -> Result<(), LockboxError> {
        let sealed = node.seal(&self.engine)?;
        self.store.edit_node(id, &sealed).await
    }

    pub async fn remove_nodes(&self, ids: &[NodeId]) -> Result<(), LockboxError> {
        self.require_auth()?;
        self.store.remove_nodes(ids).await
    }

    /// Every tag in use, decrypted and sorted.
    pub async fn list_tags(&self) -> Result<Vec<String>, LockboxError> {
        self.require_auth()?;
        let mut tags = self
            .store
            .list_tags()
            .await?
            .iter()
            .map(|tag| self.engine.decrypt(tag))
            .collect::<Result<Vec<_>, _>>()?;
        tags.sort();
        Ok(tags)
    }

    /// Lock the session and release the store.
    pub async fn close(mut self) -> Result<(), LockboxError> {
        self.engine.lock();
        self.store.close().await?;
        debug!("lockbox closed");
        Ok(())
    }
}
