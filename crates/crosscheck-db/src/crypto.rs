//! Encryption of stored credentials.
//!
//! Connector config bundles and webhook secrets are AES-256-GCM encrypted
//! before they reach the database. Storage format:
//! `base64(nonce || ciphertext || auth_tag)`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::DbError;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Encrypt a plaintext secret to a base64-encoded string for DB storage.
pub fn encrypt_secret(plaintext: &str, key: &[u8]) -> Result<String, DbError> {
    let cipher = cipher_for(key)?;

    use rand::rngs::OsRng;
    use rand::RngCore;
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| DbError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&result))
}

/// Decrypt a base64-encoded secret from DB storage back to plaintext.
pub fn decrypt_secret(encoded: &str, key: &[u8]) -> Result<String, DbError> {
    let cipher = cipher_for(key)?;

    let encrypted = BASE64
        .decode(encoded)
        .map_err(|e| DbError::EncryptionFailed(format!("base64 decode failed: {e}")))?;

    if encrypted.len() < NONCE_SIZE + 1 {
        return Err(DbError::EncryptionFailed(
            "invalid encrypted data format".to_string(),
        ));
    }

    let nonce = Nonce::from_slice(&encrypted[..NONCE_SIZE]);
    let ciphertext = &encrypted[NONCE_SIZE..];

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| DbError::EncryptionFailed(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| DbError::EncryptionFailed(e.to_string()))
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm, DbError> {
    if key.len() != 32 {
        return Err(DbError::EncryptionFailed(format!(
            "invalid key length: expected 32 bytes, got {}",
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| DbError::EncryptionFailed(e.to_string()))
}
