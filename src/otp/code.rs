//! Code generation and comparison helpers.

use rand::rngs::OsRng;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::OtpError;

/// Generate a fresh code of `length` symbols drawn from `alphabet`.
///
/// Every symbol comes from the operating system CSPRNG; the returned value
/// is wrapped so it never leaks through `Debug` output or logs.
///
/// # Errors
/// Returns `OtpError::InvalidInput` if `length` is zero or `alphabet` is
/// empty.
pub(crate) fn generate_code(length: usize, alphabet: &str) -> Result<SecretString, OtpError> {
    let symbols: Vec<char> = alphabet.chars().collect();
    if length == 0 || symbols.is_empty() {
        return Err(OtpError::InvalidInput(
            "code length and alphabet must be non-empty".to_string(),
        ));
    }

    let mut code = String::with_capacity(length);
    for _ in 0..length {
        let index = OsRng.gen_range(0..symbols.len());
        code.push(symbols[index]);
    }

    Ok(SecretString::from(code))
}

/// Hash a code for storage; raw codes are never persisted.
pub(crate) fn hash_code(code: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.finalize().to_vec()
}

/// Constant-time check of a submitted code against a stored hash.
///
/// Both sides are hashed to fixed-length digests before the comparison, so
/// running time is independent of where the inputs first differ.
pub(crate) fn code_matches(submitted: &str, stored_hash: &[u8]) -> bool {
    let submitted_hash = hash_code(submitted);
    submitted_hash.ct_eq(stored_hash).into()
}

pub(crate) fn hash_secret(code: &SecretString) -> Vec<u8> {
    hash_code(code.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn generated_code_respects_length_and_alphabet() {
        let code = generate_code(6, "0123456789").unwrap();
        let exposed = code.expose_secret();
        assert_eq!(exposed.len(), 6);
        assert!(exposed.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(generate_code(0, "0123456789").is_err());
        assert!(generate_code(6, "").is_err());
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash_code("123456"), hash_code("123456"));
        assert_ne!(hash_code("123456"), hash_code("123457"));
    }

    #[test]
    fn comparison_agrees_with_equality() {
        let stored = hash_code("482913");
        assert!(code_matches("482913", &stored));
        assert!(!code_matches("482914", &stored));
        assert!(!code_matches("", &stored));
    }
}
