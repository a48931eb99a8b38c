use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

use crate::models::document::UserDataDocument;
use super::aes::{self, NONCE_SIZE};
use super::kdf;

/// Errors produced while sealing or opening user data.
///
/// `Decryption` is deliberately opaque: a wrong password, a tampered
/// ciphertext, and a mismatched salt are indistinguishable to callers.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key derivation failed")]
    KeyDerivation,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decryption,

    #[error("invalid {0} encoding")]
    Encoding(&'static str),
}

/// Encrypts a user data document for transport.
///
/// The key is derived from `(password, salt)`; a fresh random IV is generated
/// for every call. Returns `(ciphertext_base64, iv_hex)`, the wire encoding
/// the backup server stores without being able to read.
pub fn seal(
    document: &UserDataDocument,
    password: &str,
    salt_hex: &str,
) -> Result<(String, String), CryptoError> {
    let key = kdf::derive_key(password, salt_hex)?;

    let plaintext = sonic_rs::to_vec(document).map_err(|_| CryptoError::Encrypt)?;
    let (ciphertext, nonce) = aes::encrypt(&key, &plaintext)?;

    Ok((general_purpose::STANDARD.encode(ciphertext), hex::encode(nonce)))
}

/// Decrypts a user data document received from the backup server.
///
/// All-or-nothing: any authentication failure yields `CryptoError::Decryption`
/// and never a partially decoded document.
pub fn open(
    ciphertext_b64: &str,
    iv_hex: &str,
    password: &str,
    salt_hex: &str,
) -> Result<UserDataDocument, CryptoError> {
    let key = kdf::derive_key(password, salt_hex)?;

    let ciphertext = general_purpose::STANDARD
        .decode(ciphertext_b64)
        .map_err(|_| CryptoError::Encoding("ciphertext"))?;
    let iv = hex::decode(iv_hex).map_err(|_| CryptoError::Encoding("iv"))?;
    let nonce: [u8; NONCE_SIZE] = iv
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::Encoding("iv"))?;

    let plaintext = aes::decrypt(&key, &ciphertext, &nonce)?;

    sonic_rs::from_slice(&plaintext).map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::UserDataDocument;

    fn sample_document() -> UserDataDocument {
        let mut doc = UserDataDocument::empty();
        doc.address.zip = "90210".to_string();
        doc.preferences.language = "es".to_string();
        doc.stats.total_votes = 3;
        doc
    }

    #[test]
    fn seal_open_round_trip() {
        let salt = kdf::generate_salt();
        let doc = sample_document();

        let (ciphertext, iv) = seal(&doc, "correct horse battery", &salt).unwrap();
        let opened = open(&ciphertext, &iv, "correct horse battery", &salt).unwrap();

        assert_eq!(opened, doc);
    }

    #[test]
    fn wrong_password_fails() {
        let salt = kdf::generate_salt();
        let (ciphertext, iv) = seal(&sample_document(), "right-password", &salt).unwrap();

        let result = open(&ciphertext, &iv, "wrong-password", &salt);
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn wrong_salt_fails() {
        let (ciphertext, iv) =
            seal(&sample_document(), "password123", &kdf::generate_salt()).unwrap();

        let result = open(&ciphertext, &iv, "password123", &kdf::generate_salt());
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn tampered_wire_ciphertext_fails() {
        let salt = kdf::generate_salt();
        let (ciphertext, iv) = seal(&sample_document(), "password123", &salt).unwrap();

        // Flip one bit in the middle of the decoded ciphertext.
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&ciphertext)
            .unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0x10;
        let tampered = base64::engine::general_purpose::STANDARD.encode(raw);

        let result = open(&tampered, &iv, "password123", &salt);
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn fresh_iv_per_seal() {
        let salt = kdf::generate_salt();
        let doc = sample_document();
        let (_, iv1) = seal(&doc, "password123", &salt).unwrap();
        let (_, iv2) = seal(&doc, "password123", &salt).unwrap();
        assert_ne!(iv1, iv2);
    }
}
