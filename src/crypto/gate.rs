// Keystorage — Credential Gate
//
// The access token is never compared in plaintext. Only an Argon2id PHC
// string (algorithm, parameters, random salt and digest) is persisted, and a
// presented token is checked against it with the constant-time verifier
// from the `password-hash` API.
//
// Keystores written before the switch to Argon2id hold a bcrypt hash. Those
// still verify; the store re-hashes the token with Argon2id once it has been
// accepted.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::TryRngCore;

use super::CryptoError;

/// Salt length in bytes, the size recommended for password hashing.
const SALT_LEN: usize = 16;

/// Hash an access token for later verification.
///
/// Every call uses a fresh salt, so two hashes of the same token differ while
/// both verify.
pub fn hash_token(token: &str) -> Result<String, CryptoError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::rngs::OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| CryptoError::Random(e.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| CryptoError::Hash(e.to_string()))?;

    Argon2::default()
        .hash_password(token.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::Hash(e.to_string()))
}

/// Prefixes of the bcrypt hash variants accepted from older keystores.
const LEGACY_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Whether `hash` is a bcrypt hash that should be upgraded to Argon2id.
pub fn is_legacy_hash(hash: &str) -> bool {
    LEGACY_PREFIXES.iter().any(|prefix| hash.starts_with(prefix))
}

/// Check a presented token against a stored hash.
///
/// Returns `false` for a wrong token and for a hash that does not parse;
/// callers cannot tell the two apart.
pub fn verify_token(token: &str, hash: &str) -> bool {
    if is_legacy_hash(hash) {
        return bcrypt::verify(token.as_bytes(), hash).unwrap_or(false);
    }

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(token.as_bytes(), &parsed)
        .is_ok()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
