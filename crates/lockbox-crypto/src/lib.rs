// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field encryption and master-key management for Lockbox.
//!
//! Every credential field is sealed on its own with AES-256-GCM under a key
//! derived from the master password with Argon2id. The derived key never
//! leaves [`CryptoEngine`], is never persisted, and is zeroized when the
//! session locks.

pub mod cipher;
pub mod engine;
pub mod kdf;
pub mod prompt;

pub use engine::CryptoEngine;
pub use prompt::{MASTER_KEY_ENV_VAR, get_new_password, get_password};
