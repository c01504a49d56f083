// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend selection from configuration.

use std::path::PathBuf;
use std::str::FromStr;

use lockbox_config::BackendConfig;
use lockbox_core::{BackendKind, LockboxError, SchemaVersion, StorageBackend};

use crate::{DocumentBackend, SqliteBackend};

fn backend_kind(config: &BackendConfig) -> Result<BackendKind, LockboxError> {
    BackendKind::from_str(config.kind.trim())
        .map_err(|_| LockboxError::UnknownBackend(config.kind.clone()))
}

fn resolve_path(kind: BackendKind, config: &BackendConfig) -> Result<PathBuf, LockboxError> {
    match config.path.as_deref().map(str::trim) {
        Some("") => Err(LockboxError::MissingConfiguration(format!(
            "backend `{kind}` requires a non-empty `path`"
        ))),
        Some(path) => Ok(PathBuf::from(path)),
        None => BackendConfig::default_path(kind).ok_or_else(|| {
            LockboxError::MissingConfiguration(format!(
                "backend `{kind}` requires `path` (no user data directory to default to)"
            ))
        }),
    }
}

/// Where the store named by `config` lives: the configured `path`, or the
/// default file for its kind.
pub fn store_path(config: &BackendConfig) -> Result<PathBuf, LockboxError> {
    resolve_path(backend_kind(config)?, config)
}

/// Resolve `config` to an unopened backend.
///
/// The identifier and its parameters are checked here, before anything is
/// touched on disk.
pub fn build_backend(config: &BackendConfig) -> Result<Box<dyn StorageBackend>, LockboxError> {
    let kind = backend_kind(config)?;
    let path = resolve_path(kind, config)?;

    Ok(match kind {
        BackendKind::Sqlite => Box::new(SqliteBackend::new(path)),
        BackendKind::Document => Box::new(DocumentBackend::new(path)),
    })
}

/// Construct and open the backend named by `config`.
pub async fn open_backend(config: &BackendConfig) -> Result<Box<dyn StorageBackend>, LockboxError> {
    let backend = build_backend(config)?;
    backend.open().await?;
    Ok(backend)
}

/// Open the configured store just long enough to read its version marker.
pub async fn check_version(config: &BackendConfig) -> Result<SchemaVersion, LockboxError> {
    let backend = open_backend(config).await?;
    let version = backend.schema_version().await;
    backend.close().await?;
    version
}
