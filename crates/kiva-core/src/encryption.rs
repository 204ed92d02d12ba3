use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::DbError;
use crate::value::{get_path, set_path, Document};

const NONCE_LEN: usize = 12;

/// Derive a 256-bit key from the database password via SHA-256.
pub fn derive_key(password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn cipher(key: &[u8; 32]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
}

/// Encrypt a single string value with a fresh random 12-byte nonce,
/// returning base64(nonce || ciphertext).
pub fn encrypt_value(key: &[u8; 32], plaintext: &str) -> Result<String, DbError> {
    let c = cipher(key);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = c
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| DbError::Encryption(e.to_string()))?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

/// Decrypt a base64(nonce || ciphertext) value. Any failure to decode or
/// authenticate returns the input unchanged — this tolerates gradual
/// rollout over previously-unencrypted data (SPEC_FULL.md §4.4).
pub fn decrypt_value(key: &[u8; 32], stored: &str) -> String {
    let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(stored) else {
        return stored.to_string();
    };
    if raw.len() < NONCE_LEN {
        return stored.to_string();
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let c = cipher(key);
    match c.decrypt(Nonce::from_slice(nonce_bytes), ciphertext) {
        Ok(plain) => String::from_utf8(plain).unwrap_or_else(|_| stored.to_string()),
        Err(_) => stored.to_string(),
    }
}

/// Encrypt every configured field path in `doc` in place. Only string
/// values are encrypted; other types pass through unchanged.
pub fn encrypt_fields(key: &[u8; 32], doc: &mut Document, fields: &std::collections::HashSet<String>) -> Result<(), DbError> {
    for path in fields {
        let Some(value) = get_path(doc, path) else {
            continue;
        };
        if let serde_json::Value::String(s) = value {
            let encrypted = encrypt_value(key, s)?;
            set_path(doc, path, serde_json::Value::String(encrypted));
        }
    }
    Ok(())
}

/// Decrypt every configured field path in `doc` in place, best-effort.
pub fn decrypt_fields(key: &[u8; 32], doc: &mut Document, fields: &std::collections::HashSet<String>) {
    for path in fields {
        let Some(value) = get_path(doc, path) else {
            continue;
        };
        if let serde_json::Value::String(s) = value {
            let decrypted = decrypt_value(key, s);
            set_path(doc, path, serde_json::Value::String(decrypted));
        }
    }
}
