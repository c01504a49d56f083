// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Lockbox configuration system.

use lockbox_config::diagnostic::ConfigError;
use lockbox_config::{BackendConfig, load_and_validate_str, load_config_from_str};
use lockbox_core::BackendKind;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[general]
log_level = "debug"

[backend]
kind = "document"
path = "/tmp/lockbox.json"

[crypto]
kdf_memory_cost = 32768
kdf_iterations = 2
kdf_parallelism = 1

[generator]
length = 32
symbols = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.backend.kind, "document");
    assert_eq!(config.backend.path.as_deref(), Some("/tmp/lockbox.json"));
    assert_eq!(config.crypto.kdf_params().memory_cost, 32768);
    assert_eq!(config.crypto.kdf_params().iterations, 2);
    assert_eq!(config.crypto.kdf_params().parallelism, 1);
    assert_eq!(config.generator.length, 32);
    assert!(!config.generator.symbols);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.backend.kind, "sqlite");
    assert!(config.backend.path.is_none());
    assert_eq!(config.crypto.kdf_memory_cost, 65536);
    assert_eq!(config.crypto.kdf_iterations, 3);
    assert_eq!(config.crypto.kdf_parallelism, 4);
}

#[test]
fn default_store_file_follows_the_backend_kind() {
    let sqlite = BackendConfig::default_path(BackendKind::Sqlite);
    let document = BackendConfig::default_path(BackendKind::Document);
    if let (Some(sqlite), Some(document)) = (sqlite, document) {
        assert_eq!(sqlite.extension().and_then(|e| e.to_str()), Some("db"));
        assert_eq!(document.extension().and_then(|e| e.to_str()), Some("json"));
        assert_eq!(sqlite.parent(), document.parent());
    }
}

#[test]
fn misspelled_key_gets_a_suggestion() {
    let toml = r#"
[backend]
knd = "sqlite"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey { key, suggestion, .. } => Some((key, suggestion)),
            _ => None,
        })
        .expect("an unknown-key error");
    assert_eq!(unknown.0, "knd");
    assert_eq!(unknown.1.as_deref(), Some("kind"));
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[clipboard]
timeout = 5
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "clipboard"))
    );
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[crypto]
kdf_iterations = "many"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("kdf_iterations")))
    );
}

#[test]
fn semantic_errors_come_back_together() {
    let toml = r#"
[backend]
kind = "postgres"

[crypto]
kdf_iterations = 1
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
}
