// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Random password generation.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!#$%&()*+,-./:;<=>?@[]^_{|}~";

/// Generate a password of `length` characters from the OS CSPRNG.
///
/// Passwords of three characters or more always contain a lowercase letter,
/// an uppercase letter and a digit.
pub fn generate_password(length: usize, symbols: bool) -> String {
    let mut rng = OsRng;
    let mut pool: Vec<u8> = [LOWER, UPPER, DIGITS].concat();
    if symbols {
        pool.extend_from_slice(SYMBOLS);
    }

    let mut chars: Vec<u8> = Vec::with_capacity(length);
    if length >= 3 {
        for class in [LOWER, UPPER, DIGITS] {
            chars.extend(class.choose(&mut rng));
        }
    }
    while chars.len() < length {
        chars.extend(pool.choose(&mut rng));
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

/// Replace letters with look-alike digits: a→4, e→3, i→1, o→0, s→5, t→7.
pub fn leetify(text: &str) -> String {
    text.chars()
        .map(|c| match c.to_ascii_lowercase() {
            'a' => '4',
            'e' => '3',
            'i' => '1',
            'o' => '0',
            's' => '5',
            't' => '7',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_respected() {
        for length in [0, 1, 2, 3, 20, 256] {
            assert_eq!(generate_password(length, true).len(), length);
        }
    }

    #[test]
    fn every_class_is_present() {
        for _ in 0..50 {
            let pw = generate_password(3, false);
            assert!(pw.chars().any(|c| c.is_ascii_lowercase()));
            assert!(pw.chars().any(|c| c.is_ascii_uppercase()));
            assert!(pw.chars().any(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn symbols_only_when_asked() {
        let pw = generate_password(200, false);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn leetify_substitutes_both_cases() {
        assert_eq!(leetify("Passwort Site"), "P455w0r7 5173");
        assert_eq!(leetify("xyz"), "xyz");
    }
}
