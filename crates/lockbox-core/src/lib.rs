// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lockbox secret store.
//!
//! Provides the workspace error type, the ciphertext-only record shapes that
//! flow between the crypto engine and persistence, and the
//! [`StorageBackend`] trait every backend implements.

pub mod error;
pub mod traits;
pub mod types;

pub use error::LockboxError;
pub use traits::StorageBackend;
pub use types::{
    BackendKind, CipherText, CryptoInfo, KdfParams, LegacyNode, NodeId, SchemaVersion,
    SealedFields, SealedNode, StoredNode, Verifier, WriteOp,
};
