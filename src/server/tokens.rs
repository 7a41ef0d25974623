//! Credential primitives: session tokens, user ids, and password digests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Random bytes in a session token.
const TOKEN_BYTES: usize = 32;
/// Random bytes in a generated user id.
const USER_ID_BYTES: usize = 12;
/// Random bytes in a password salt.
const SALT_BYTES: usize = 16;

fn random_base64<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a secure random session token.
///
/// Returns 32 random bytes encoded as base64url (no padding).
pub fn generate_token() -> String {
    random_base64::<TOKEN_BYTES>()
}

/// Generates an opaque user id.
pub fn generate_user_id() -> String {
    format!("user_{}", random_base64::<USER_ID_BYTES>())
}

/// Generates a fresh password salt.
pub fn generate_salt() -> String {
    random_base64::<SALT_BYTES>()
}

/// Digests `password` with `salt` (SHA-256, base64url).
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Checks `password` against a stored salt and digest.
pub fn verify_password(salt: &str, password: &str, expected: &str) -> bool {
    let actual = hash_password(salt, password);
    // Constant-time comparison
    actual.len() == expected.len()
        && actual
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
