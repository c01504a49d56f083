// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Lockbox.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is a
//! startup error instead of a silently ignored setting.

use std::path::PathBuf;

use lockbox_core::{BackendKind, KdfParams};
use serde::{Deserialize, Serialize};

/// Top-level Lockbox configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockboxConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Storage backend selection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Master key derivation settings.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Password generator defaults.
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Log level for the `lockbox` crates (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend selection: an opaque identifier plus its parameters.
///
/// The identifier is deliberately a plain string here. It is resolved and
/// checked when the backend is opened, not when the file is parsed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Backend identifier: `sqlite` or `document`.
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    /// Database filename (SQLite) or document filename (JSON). When absent,
    /// a per-kind file under the user data directory is used.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            path: None,
        }
    }
}

impl BackendConfig {
    /// Store location for `kind` when no `path` is configured:
    /// `<data_dir>/lockbox/lockbox.db` or `<data_dir>/lockbox/lockbox.json`.
    pub fn default_path(kind: BackendKind) -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("lockbox").join(kind.default_file_name()))
    }
}

fn default_backend_kind() -> String {
    "sqlite".to_string()
}

/// Master key derivation configuration.
///
/// Argon2id parameters applied when a master password is set or changed.
/// Existing stores keep authenticating with the parameters they were created
/// with. Defaults follow OWASP recommendations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CryptoConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB).
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count (default: 3).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id parallelism lanes (default: 4).
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl CryptoConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_cost: self.kdf_memory_cost,
            iterations: self.kdf_iterations,
            parallelism: self.kdf_parallelism,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

fn default_kdf_memory_cost() -> u32 {
    65536
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Generated password length.
    #[serde(default = "default_password_length")]
    pub length: usize,

    /// Include punctuation symbols in generated passwords.
    #[serde(default = "default_symbols")]
    pub symbols: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            length: default_password_length(),
            symbols: default_symbols(),
        }
    }
}

fn default_password_length() -> usize {
    20
}

fn default_symbols() -> bool {
    true
}
