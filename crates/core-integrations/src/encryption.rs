//! AES-256-GCM encryption for `Client` credentials at rest (§6: "encrypted
//! at rest"). Adapted from the teacher's integration-credential storage;
//! here it wraps `core_models::ClientCredentials` specifically instead of
//! a generic provider-credentials enum.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::Rng;

const KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;

/// Output format: nonce (12 bytes) || ciphertext.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LENGTH]) -> Result<Vec<u8>, String> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| format!("failed to create cipher: {}", e))?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::thread_rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| format!("encryption failed: {}", e))?;

    let mut result = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend(ciphertext);
    Ok(result)
}

pub fn decrypt(encrypted: &[u8], key: &[u8; KEY_LENGTH]) -> Result<Vec<u8>, String> {
    if encrypted.len() < NONCE_LENGTH {
        return Err("encrypted data too short".to_string());
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| format!("failed to create cipher: {}", e))?;
    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LENGTH);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| format!("decryption failed: {}", e))
}

pub fn encrypt_json<T: serde::Serialize>(value: &T, key: &[u8; KEY_LENGTH]) -> Result<Vec<u8>, String> {
    let json = serde_json::to_vec(value).map_err(|e| format!("json serialization failed: {}", e))?;
    encrypt(&json, key)
}

pub fn decrypt_json<T: serde::de::DeserializeOwned>(encrypted: &[u8], key: &[u8; KEY_LENGTH]) -> Result<T, String> {
    let plaintext = decrypt(encrypted, key)?;
    serde_json::from_slice(&plaintext).map_err(|e| format!("json deserialization failed: {}", e))
}

/// Load the 32-byte master key from `CREDENTIAL_ENCRYPTION_KEY` (hex). No
/// hardcoded fallback — the binary refuses to start without it.
pub fn load_key_from_env() -> Result<[u8; KEY_LENGTH], String> {
    let key_hex = std::env::var("CREDENTIAL_ENCRYPTION_KEY")
        .map_err(|_| "CREDENTIAL_ENCRYPTION_KEY is not set".to_string())?;
    let bytes = hex::decode(&key_hex).map_err(|e| format!("invalid hex in CREDENTIAL_ENCRYPTION_KEY: {}", e))?;
    if bytes.len() != KEY_LENGTH {
        return Err(format!("CREDENTIAL_ENCRYPTION_KEY must decode to {} bytes, got {}", KEY_LENGTH, bytes.len()));
    }
    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = [7u8; KEY_LENGTH];
        let plaintext = b"hello credentials";
        let encrypted = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&encrypted, &key).unwrap();
        assert_eq!(plaintext.to_vec(), decrypted);
    }

    #[test]
    fn encrypt_json_roundtrip() {
        let key = [9u8; KEY_LENGTH];
        let value = serde_json::json!({"auth_id": "MAXXXXXXXXXXXXXXXXXX", "auth_token": "secret"});
        let encrypted = encrypt_json(&value, &key).unwrap();
        let decrypted: serde_json::Value = decrypt_json(&encrypted, &key).unwrap();
        assert_eq!(value, decrypted);
    }
}
