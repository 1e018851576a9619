// ABOUTME: Cryptographic helpers for authorization code generation and credential verification
// ABOUTME: Wraps the system RNG and bcrypt behind small capability functions
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};

/// Generate a URL-safe random string from `length` bytes of system
/// randomness. 32 bytes gives 256 bits of entropy for authorization codes.
///
/// # Errors
/// Returns an error if the system RNG fails; the server cannot operate
/// securely without working randomness.
pub fn generate_random_string(length: usize) -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; length];

    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!("CRITICAL: SystemRandom failed - cannot generate secure random bytes: {e}");
        AppError::internal("System RNG failure - server cannot operate securely")
    })?;

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
}

/// Generate an opaque authorization code
///
/// # Errors
/// Returns an error if the system RNG fails.
pub fn generate_auth_code() -> AppResult<String> {
    generate_random_string(32)
}

/// Verify a plaintext secret against a stored bcrypt hash. The hashing
/// scheme is an external concern; callers only see a boolean.
#[must_use]
pub fn verify_password(secret: &str, hash: &str) -> bool {
    bcrypt::verify(secret, hash).unwrap_or(false)
}

/// Hash a credential for storage
///
/// # Errors
/// Returns an error if bcrypt hashing fails.
pub fn hash_password(secret: &str) -> AppResult<String> {
    bcrypt::hash(secret, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
}

/// Generate a random placeholder credential for federated first logins.
/// The plaintext is discarded immediately; only the hash is stored, so the
/// credential can never be used to log in directly.
///
/// # Errors
/// Returns an error if the system RNG or bcrypt fails.
pub fn generate_placeholder_credential() -> AppResult<String> {
    let plaintext = generate_random_string(24)?;
    hash_password(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_code_entropy_and_charset() {
        let code = generate_auth_code().unwrap();
        // 32 bytes -> 43 base64url chars, no padding
        assert_eq!(code.len(), 43);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // The separator used by the federation state must never appear
        assert!(!code.contains('|'));
    }

    #[test]
    fn test_codes_are_unique() {
        let a = generate_auth_code().unwrap();
        let b = generate_auth_code().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("secret", "not-a-bcrypt-hash"));
    }
}
