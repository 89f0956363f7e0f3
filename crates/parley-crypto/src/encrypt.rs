use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

/// Encrypt a message body with AES-256-GCM.
/// Returns (ciphertext, nonce).
pub fn encrypt_body(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok((ciphertext, nonce_bytes.to_vec()))
}

/// Decrypt a message body with AES-256-GCM.
pub fn decrypt_body(key: &[u8; 32], ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let nonce = Nonce::from_slice(nonce);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow!("Decryption failed: {}", e))?;

    Ok(plaintext)
}

/// Encrypt a UTF-8 body and base64 both parts for the JSON wire format.
/// Returns (ciphertext_b64, nonce_b64).
pub fn encrypt_to_base64(key: &[u8; 32], plaintext: &str) -> Result<(String, String)> {
    let (ciphertext, nonce) = encrypt_body(key, plaintext.as_bytes())?;
    Ok((BASE64.encode(ciphertext), BASE64.encode(nonce)))
}

/// Reverse of [`encrypt_to_base64`]: decode, decrypt, and re-validate UTF-8.
pub fn decrypt_from_base64(key: &[u8; 32], ciphertext_b64: &str, nonce_b64: &str) -> Result<String> {
    let ciphertext = BASE64.decode(ciphertext_b64)?;
    let nonce = BASE64.decode(nonce_b64)?;
    let plaintext = decrypt_body(key, &ciphertext, &nonce)?;
    String::from_utf8(plaintext).map_err(|e| anyhow!("Decrypted body is not UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_conversation_key;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_conversation_key();
        let message = b"Hello from Parley!";

        let (ciphertext, nonce) = encrypt_body(&key, message).unwrap();
        assert_ne!(&ciphertext, message);

        let decrypted = decrypt_body(&key, &ciphertext, &nonce).unwrap();
        assert_eq!(decrypted, message);
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = generate_conversation_key();
        let key2 = generate_conversation_key();
        let message = b"Secret message";

        let (ciphertext, nonce) = encrypt_body(&key1, message).unwrap();
        let result = decrypt_body(&key2, &ciphertext, &nonce);
        assert!(result.is_err());
    }

    #[test]
    fn base64_wire_roundtrip() {
        let key = generate_conversation_key();

        let (ciphertext_b64, nonce_b64) = encrypt_to_base64(&key, "hello").unwrap();
        let body = decrypt_from_base64(&key, &ciphertext_b64, &nonce_b64).unwrap();
        assert_eq!(body, "hello");
    }
}
