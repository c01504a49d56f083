// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backends for the Lockbox secret store.
//!
//! Two implementations of [`lockbox_core::StorageBackend`]:
//!
//! - [`SqliteBackend`]: relational store, tags normalized through a join table.
//! - [`DocumentBackend`]: one JSON document, tags in a reference-counted collection.
//!
//! Both hold ciphertext only and keep the same tag de-duplication and orphan
//! cleanup guarantees. [`open_backend`] picks one from configuration.

pub mod document;
pub mod factory;
pub mod sqlite;

pub use document::DocumentBackend;
pub use factory::{check_version, open_backend, store_path};
pub use sqlite::SqliteBackend;

use lockbox_core::{LockboxError, SchemaVersion, WriteOp};

/// Key material lives in the same place in every known layout, so meta
/// operations only refuse versions this build cannot read at all.
pub(crate) fn known_gate(found: SchemaVersion) -> Result<(), LockboxError> {
    if found.is_known() {
        Ok(())
    } else {
        Err(LockboxError::UnsupportedSchemaVersion {
            found,
            supported: SchemaVersion::CURRENT,
        })
    }
}

/// Node and tag operations only run against the current layout.
pub(crate) fn version_gate(found: SchemaVersion) -> Result<(), LockboxError> {
    if found == SchemaVersion::CURRENT {
        Ok(())
    } else if found.is_known() {
        Err(LockboxError::MigrationRequired {
            found,
            current: SchemaVersion::CURRENT,
        })
    } else {
        Err(LockboxError::UnsupportedSchemaVersion {
            found,
            supported: SchemaVersion::CURRENT,
        })
    }
}

/// Reject a batch before any of it is applied.
///
/// Node replacements need the current layout (as it stands at that point in
/// the batch), layout rewrites only target layouts that can be written, and
/// both the stored and the written version markers must be known. Returns
/// the last version the batch sets.
pub(crate) fn check_batch(
    ops: &[WriteOp],
    stored: SchemaVersion,
) -> Result<Option<SchemaVersion>, LockboxError> {
    known_gate(stored)?;
    let mut layout = stored;
    let mut new_version = None;
    for op in ops {
        match op {
            WriteOp::ReplaceNode { .. } => version_gate(layout)?,
            WriteOp::RewriteLayout { target, .. } => {
                if *target < SchemaVersion::INLINE_TAGS || !target.is_known() {
                    return Err(LockboxError::UnsupportedSchemaVersion {
                        found: *target,
                        supported: SchemaVersion::CURRENT,
                    });
                }
                layout = *target;
            }
            WriteOp::SetSchemaVersion(version) => {
                if !version.is_known() {
                    return Err(LockboxError::UnsupportedSchemaVersion {
                        found: *version,
                        supported: SchemaVersion::CURRENT,
                    });
                }
                new_version = Some(*version);
            }
            WriteOp::SaveKey(_) | WriteOp::SaveCryptoInfo(_) => {}
        }
    }
    Ok(new_version)
}
