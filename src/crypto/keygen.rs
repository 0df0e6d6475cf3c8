// Keystorage — Private key generation
//
// The store asks a `KeyGenerator` for fresh key material instead of knowing
// how keys are made. The production generator draws a secp256k1 secret
// scalar from the OS random source and renders it as 0x-prefixed hex, the
// form operators paste back into `add`.

use rand::TryRngCore;
use zeroize::Zeroizing;

use super::CryptoError;

/// Length of a secp256k1 secret scalar in bytes.
const SECRET_KEY_LEN: usize = 32;

/// Order of the secp256k1 group, big-endian. Valid secret keys lie in [1, n).
const SECP256K1_ORDER: [u8; SECRET_KEY_LEN] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Source of new private keys, enabling deterministic generators in tests.
pub trait KeyGenerator {
    /// Produce a new private key in its canonical string form.
    fn generate(&self) -> Result<Zeroizing<String>, CryptoError>;
}

// ─── Production Implementation ───────────────────────────────────────────────

/// Generates secp256k1 secret keys as `0x` + 64 lowercase hex characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomKeyGenerator;

impl RandomKeyGenerator {
    /// Whether `candidate` is a usable secret scalar (non-zero and below n).
    fn in_range(candidate: &[u8; SECRET_KEY_LEN]) -> bool {
        // Same-length big-endian arrays compare lexicographically as integers.
        candidate.iter().any(|b| *b != 0) && candidate < &SECP256K1_ORDER
    }
}

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> Result<Zeroizing<String>, CryptoError> {
        let mut scalar = Zeroizing::new([0u8; SECRET_KEY_LEN]);

        // Out-of-range draws have probability ~2^-128; retry rather than reduce.
        loop {
            rand::rngs::OsRng
                .try_fill_bytes(scalar.as_mut_slice())
                .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
            if Self::in_range(&scalar) {
                break;
            }
        }

        let body = Zeroizing::new(hex::encode(&scalar[..]));
        Ok(Zeroizing::new(format!("0x{}", body.as_str())))
    }
}

/// Normalize a user-supplied key to carry a single `0x` prefix.
pub fn add_hex_prefix(key: &str) -> String {
    let key = key.trim();
    if key.starts_with("0x") || key.starts_with("0X") {
        format!("0x{}", &key[2..])
    } else {
        format!("0x{}", key)
    }
}

// ─── Deterministic Generator for Testing ─────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
