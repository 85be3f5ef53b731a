//! Password hashing and session tokens
//!
//! Pure functions only; persistence lives in [`crate::db::users`] and the
//! HTTP middleware lives in the server crate.
//!
//! - Salt: 16 random bytes, hex encoded
//! - Hash: SHA-256 of `salt || password`, 64 hex characters
//! - Session token: 32 random bytes, hex encoded

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a random salt for a new password
pub fn generate_salt() -> String {
    random_hex(16)
}

/// Generate a new session token
pub fn generate_session_token() -> String {
    random_hex(32)
}

/// Hash a password with its salt
///
/// ```
/// use condo_common::auth::hash_password;
///
/// let hash = hash_password("s3cret", "abcd");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_password("s3cret", "abcd"));
/// ```
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a password against a stored hash and salt
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    constant_time_eq(hash_password(password, salt).as_bytes(), expected_hash.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
