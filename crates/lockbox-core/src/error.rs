// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lockbox secret store.

use thiserror::Error;

use crate::types::{NodeId, SchemaVersion};

/// The error type shared by the crypto engine, every storage backend, and the
/// schema migrator.
///
/// Variants are terminal for the operation that raised them. Nothing in the
/// workspace retries on any of them.
#[derive(Debug, Error)]
pub enum LockboxError {
    /// An encrypt/decrypt or CRUD call was made while no master key is active.
    #[error("store is locked -- authenticate with the master password first")]
    NotAuthenticated,

    /// Unlocking failed because the master password did not match.
    #[error("wrong master password")]
    WrongPassword,

    /// `change_password` was given the wrong current password. Nothing was written.
    #[error("current master password is incorrect -- nothing was changed")]
    BadCurrentPassword,

    /// Ciphertext did not validate under the active key.
    ///
    /// Carries no detail on purpose: a wrong key and corrupted data must look
    /// identical to the caller.
    #[error("decryption failed -- stored data is corrupted or was written under another key")]
    DecryptionFailed,

    /// The backend could not be reached or created.
    #[error("storage backend `{backend}` is unavailable: {source}")]
    StorageUnavailable {
        backend: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required connection parameter is absent from the backend configuration.
    #[error("missing backend configuration: {0}")]
    MissingConfiguration(String),

    /// The backend identifier does not name a known backend.
    #[error("unknown storage backend `{0}`")]
    UnknownBackend(String),

    /// The stored format version is unknown or newer than this build supports.
    #[error("unsupported schema version {found} (this build supports up to {supported})")]
    UnsupportedSchemaVersion {
        found: SchemaVersion,
        supported: SchemaVersion,
    },

    /// The store predates the current format and has to be migrated before use.
    #[error("store is at schema version {found}; migrate to {current} before use")]
    MigrationRequired {
        found: SchemaVersion,
        current: SchemaVersion,
    },

    /// `initialize` was called on a store that already has a master password.
    #[error("a master password is already set for this store")]
    AlreadyInitialized,

    /// `authenticate` was called on a store that has no master password yet.
    #[error("no master password has been set for this store -- initialize it first")]
    NotInitialized,

    /// An edit referenced a node id that does not exist.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// Persisted data outside a ciphertext (verifier, crypto info, a legacy
    /// record's text layout) could not be parsed.
    #[error("stored data is corrupted: {0}")]
    Corrupted(String),

    /// Query or I/O failure on an already-open backend.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failure inside a cryptographic primitive (RNG, KDF parameter rejection).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LockboxError {
    /// Wrap any error as a [`LockboxError::Storage`].
    pub fn storage<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Wrap any error as a [`LockboxError::StorageUnavailable`] for `backend`.
    pub fn unavailable<E>(backend: &str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::StorageUnavailable {
            backend: backend.to_string(),
            source: source.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T, E = LockboxError> = std::result::Result<T, E>;
