// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential records, schema migration and the [`Lockbox`] session facade.

pub mod lockbox;
pub mod migrator;
pub mod passgen;
pub mod record;

pub use lockbox::Lockbox;
pub use migrator::SchemaMigrator;
pub use passgen::{generate_password, leetify};
pub use record::{NewNode, Node};
