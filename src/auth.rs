//! Password hashing and verification (RFC 4643 AUTHINFO backend)
//!
//! Credentials are stored as `base64(SHA-512(salt || password))` next to a
//! base64 salt. The salt is regenerated on every password change, and
//! verification never short-circuits on the first mismatching byte.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use sha2::{Digest, Sha512};

/// Salt length in bytes
const SALT_LEN: usize = 16;

/// Generate a fresh random salt, base64-encoded
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    BASE64.encode(salt)
}

/// Hash a password with the given base64 salt
///
/// The digest input is the raw salt bytes followed by the UTF-8 bytes of the
/// password; the result is base64-encoded.
pub fn hash_password(salt_b64: &str, password: &str) -> String {
    let salt = BASE64.decode(salt_b64).unwrap_or_default();
    let mut hasher = Sha512::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Verify a candidate password against a stored hash
///
/// Hashes the candidate with the stored salt and compares digests in
/// constant time.
#[must_use]
pub fn verify_password(stored_hash_b64: &str, salt_b64: &str, candidate: &str) -> bool {
    let computed = hash_password(salt_b64, candidate);
    constant_time_eq(computed.as_bytes(), stored_hash_b64.as_bytes())
}

/// Constant-time byte comparison
///
/// Accumulates the XOR of every byte pair so the running time depends only
/// on the input length, never on where the first difference sits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
