use argon2::Argon2;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use super::aes::{SecureKey, KEY_SIZE};
use super::vault::CryptoError;

/// The size of the key-derivation salt in bytes.
pub const SALT_SIZE: usize = 16;
/// The size of a recovery key in bytes.
pub const RECOVERY_KEY_SIZE: usize = 32;

/// Derives an AES-256 key from a password and a hex-encoded salt using Argon2id.
///
/// Deterministic: the same `(password, salt)` pair always yields the same key,
/// and different salts yield unrelated keys. Intentionally expensive.
pub fn derive_key(password: &str, salt_hex: &str) -> Result<SecureKey, CryptoError> {
    let salt = hex::decode(salt_hex).map_err(|_| CryptoError::Encoding("salt"))?;

    let mut key = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(password.as_bytes(), &salt, &mut key)
        .map_err(|_| CryptoError::KeyDerivation)?;

    Ok(SecureKey::new(key))
}

/// Generates a new random key-derivation salt, hex encoded.
///
/// Generated once at registration (or password reset) and reused for every
/// encryption for the account, so the derived key stays stable across syncs.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Generates a new random recovery key, hex encoded.
///
/// Shown to the user exactly once; only its hash is ever persisted.
pub fn generate_recovery_key() -> String {
    let mut key = [0u8; RECOVERY_KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

/// Hashes a password (or recovery key) with SHA-256, hex encoded.
///
/// Used for local equality checks and for the stored recovery hash. Never
/// usable by the server to verify the encryption password itself, which is
/// never transmitted.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
