// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of stopping at the first one.

use std::str::FromStr;

use lockbox_core::BackendKind;

use crate::diagnostic::ConfigError;
use crate::model::LockboxConfig;

/// Lowest Argon2id memory cost accepted (32 MiB).
pub const MIN_KDF_MEMORY_COST: u32 = 32768;

/// Lowest Argon2id pass count accepted.
pub const MIN_KDF_ITERATIONS: u32 = 2;

/// Generated passwords shorter than this are rejected.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Generated passwords longer than this are rejected.
pub const MAX_PASSWORD_LENGTH: usize = 256;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &LockboxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let kind = config.backend.kind.trim();
    if kind.is_empty() {
        errors.push(invalid("backend.kind must not be empty".to_string()));
    } else if BackendKind::from_str(kind).is_err() {
        errors.push(invalid(format!(
            "backend.kind `{kind}` is not a known backend (expected `sqlite` or `document`)"
        )));
    }

    if let Some(path) = &config.backend.path
        && path.trim().is_empty()
    {
        errors.push(invalid("backend.path must not be empty when set".to_string()));
    }

    if !LOG_LEVELS.contains(&config.general.log_level.as_str()) {
        errors.push(invalid(format!(
            "general.log_level `{}` must be one of {}",
            config.general.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.crypto.kdf_memory_cost < MIN_KDF_MEMORY_COST {
        errors.push(invalid(format!(
            "crypto.kdf_memory_cost must be at least {MIN_KDF_MEMORY_COST} (32 MiB), got {}",
            config.crypto.kdf_memory_cost
        )));
    }

    if config.crypto.kdf_iterations < MIN_KDF_ITERATIONS {
        errors.push(invalid(format!(
            "crypto.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
            config.crypto.kdf_iterations
        )));
    }

    if config.crypto.kdf_parallelism < 1 {
        errors.push(invalid(format!(
            "crypto.kdf_parallelism must be at least 1, got {}",
            config.crypto.kdf_parallelism
        )));
    }

    let length = config.generator.length;
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        errors.push(invalid(format!(
            "generator.length must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH}, got {length}"
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Validation { message }
}
