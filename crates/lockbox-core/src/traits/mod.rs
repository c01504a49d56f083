// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams between the engine and persistence.

pub mod backend;

pub use backend::StorageBackend;
