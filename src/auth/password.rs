//! Password hashing and verification
//!
//! bcrypt with the library default cost. The salt varies per call, so two
//! hashes of the same password differ while both verify. Persisting the
//! resulting hash is the caller's responsibility.

use bcrypt::{hash, verify, DEFAULT_COST};

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Verify a plaintext password against a stored hash.
///
/// A missing or malformed hash counts as a verification failure, not an
/// error: OAuth-created accounts have no usable password hash and must not
/// be able to log in locally.
pub fn verify_password(password: &str, hash: Option<&str>) -> bool {
    match hash {
        Some(h) if !h.is_empty() => verify(password, h).unwrap_or(false),
        _ => false,
    }
}
