// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./lockbox.toml` > `~/.config/lockbox/lockbox.toml` >
//! `/etc/lockbox/lockbox.toml`, with `LOCKBOX_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LockboxConfig;

/// Environment variables under the `LOCKBOX_` prefix that are not config keys.
const NON_CONFIG_VARS: &[&str] = &["master_key"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<LockboxConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LockboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LockboxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LockboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LockboxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LockboxConfig::default()))
        .merge(Toml::file("/etc/lockbox/lockbox.toml"))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file("lockbox.toml"))
        .merge(env_provider())
}

/// `~/.config/lockbox/lockbox.toml`, if a config dir exists on this platform.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("lockbox").join("lockbox.toml"))
}

/// Env provider mapping `LOCKBOX_SECTION_KEY` to `section.key`.
///
/// Only the first underscore after the section name becomes a dot, so
/// `LOCKBOX_CRYPTO_KDF_MEMORY_COST` maps to `crypto.kdf_memory_cost`.
fn env_provider() -> Env {
    Env::prefixed("LOCKBOX_")
        .filter(|key| !NON_CONFIG_VARS.iter().any(|skip| key.as_str() == *skip))
        .map(|key| {
            key.as_str()
                .replacen("general_", "general.", 1)
                .replacen("backend_", "backend.", 1)
                .replacen("crypto_", "crypto.", 1)
                .replacen("generator_", "generator.", 1)
                .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LOCKBOX_BACKEND_KIND", "document");
            jail.set_env("LOCKBOX_CRYPTO_KDF_ITERATIONS", "5");
            jail.set_env("LOCKBOX_MASTER_KEY", "not-a-config-key");
            let config = load_config_from_path(Path::new("missing.toml"))?;
            assert_eq!(config.backend.kind, "document");
            assert_eq!(config.crypto.kdf_iterations, 5);
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "lockbox.toml",
                r#"
[backend]
kind = "document"
path = "store.json"
"#,
            )?;
            let config = load_config()?;
            assert_eq!(config.backend.kind, "document");
            assert_eq!(config.backend.path.as_deref(), Some("store.json"));
            Ok(())
        });
    }
}
