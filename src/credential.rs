//! Salted password hashing for the per-user `SECURE` tables.
//!
//! PBKDF2-HMAC-SHA-256 with a fixed 2^16 iteration count; salts come from
//! the OS CSPRNG and both salt and derived key are stored base64-encoded
//! so they can live in plain text columns.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::RolodexError;

// Hash mixing rounds (2^16).
const ITERATIONS: u32 = 65_536;

// Derived key length in bytes (a 256-bit key).
const KEY_LENGTH: usize = 32;

/// Default salt length in bytes, matching what the provisioner writes into
/// every freshly created `SECURE` table.
pub const SALT_LENGTH: usize = 512;

/// Returns `length` cryptographically secure random bytes, base64-encoded.
pub fn generate_salt(length: usize) -> Result<String, RolodexError> {
    if length < 1 {
        return Err(RolodexError::validation("salt length must be > 0"));
    }
    let mut salt = vec![0u8; length];
    OsRng.fill_bytes(&mut salt);
    Ok(BASE64.encode(&salt))
}

/// Derives a fixed-length key from `password` and `salt`, base64-encoded
/// for storage as text.
///
/// The working copy of the password lives in a `Zeroizing` buffer, so it is
/// wiped from memory once derivation finishes.
pub fn hash_password(password: &str, salt: &str) -> String {
    let secret = Zeroizing::new(password.as_bytes().to_vec());
    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2_hmac::<Sha256>(&secret, salt.as_bytes(), ITERATIONS, &mut key[..]);
    BASE64.encode(&key[..])
}

/// Recomputes the hash for `password` under `salt` and compares it to
/// `hash` in constant time.
pub fn verify_password(password: &str, hash: &str, salt: &str) -> bool {
    let computed = hash_password(password, salt);
    computed.as_bytes().ct_eq(hash.as_bytes()).into()
}
