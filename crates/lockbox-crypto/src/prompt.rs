// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master password acquisition via TTY prompt or the LOCKBOX_MASTER_KEY
//! environment variable.

use lockbox_core::LockboxError;
use secrecy::SecretString;

/// The environment variable name for providing the master password.
pub const MASTER_KEY_ENV_VAR: &str = "LOCKBOX_MASTER_KEY";

const NO_SOURCE: &str =
    "no master password provided -- set LOCKBOX_MASTER_KEY or run interactively";

fn from_env() -> Option<SecretString> {
    std::env::var(MASTER_KEY_ENV_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

fn read_tty(label: &str) -> Result<String, LockboxError> {
    eprint!("{label}: ");
    let value = rpassword::read_password()
        .map_err(|e| LockboxError::Internal(format!("failed to read password: {e}")))?;
    if value.is_empty() {
        return Err(LockboxError::Config("empty master password not allowed".to_string()));
    }
    Ok(value)
}

/// Get a password from `LOCKBOX_MASTER_KEY` or an interactive prompt labelled `label`.
pub fn get_password(label: &str) -> Result<SecretString, LockboxError> {
    if let Some(key) = from_env() {
        return Ok(key);
    }
    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return read_tty(label).map(SecretString::from);
    }
    Err(LockboxError::Config(NO_SOURCE.to_string()))
}

/// Prompt twice for a new password and check both entries match.
///
/// The environment variable needs no confirmation. `env_override` controls
/// whether it is consulted at all: `passwd` reads the current password from
/// the environment but always prompts for the replacement.
pub fn get_new_password(label: &str, env_override: bool) -> Result<SecretString, LockboxError> {
    if env_override && let Some(key) = from_env() {
        return Ok(key);
    }
    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let first = read_tty(label)?;
        let second = read_tty("Confirm")?;
        if first != second {
            return Err(LockboxError::Config("passwords do not match".to_string()));
        }
        return Ok(SecretString::from(first));
    }
    Err(LockboxError::Config(NO_SOURCE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    #[test]
    #[serial]
    fn password_from_env_var() {
        // SAFETY: test-only env mutation, serialized with the other env tests.
        unsafe { std::env::set_var(MASTER_KEY_ENV_VAR, "correct-key") };
        let result = get_password("Master password");
        unsafe { std::env::remove_var(MASTER_KEY_ENV_VAR) };

        assert_eq!(result.unwrap().expose_secret(), "correct-key");
    }

    #[test]
    #[serial]
    fn new_password_from_env_var_skips_confirmation() {
        unsafe { std::env::set_var(MASTER_KEY_ENV_VAR, "correct-key") };
        let result = get_new_password("New master password", true);
        unsafe { std::env::remove_var(MASTER_KEY_ENV_VAR) };

        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn empty_env_var_is_ignored() {
        unsafe { std::env::set_var(MASTER_KEY_ENV_VAR, "") };
        // stdin is not a terminal under the test harness.
        let result = get_password("Master password");
        unsafe { std::env::remove_var(MASTER_KEY_ENV_VAR) };

        assert!(result.is_err());
    }
}
