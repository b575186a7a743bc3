//! Token encryption module using AES-256-GCM
//!
//! Provider tokens are stored as ciphertext bound through additional
//! authenticated data to the integration they belong to, so a ciphertext
//! copied onto another row fails to decrypt.

#![allow(deprecated)]

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION_ENCRYPTED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_ENCRYPTED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

/// Crypto error types
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("empty ciphertext")]
    EmptyCiphertext,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingKey(Vec<u8>);

/// Type alias for crypto keys
pub type CryptoKey = ZeroizingKey;

impl CryptoKey {
    /// Create a new crypto key from bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::EncryptionFailed(
                "Invalid key length: expected 32 bytes".to_string(),
            ));
        }
        Ok(ZeroizingKey(bytes))
    }

    /// Get the key as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Encrypt bytes using AES-256-GCM
pub fn encrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    // Create cipher
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    // Generate random nonce
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // Encrypt with AAD
    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // Prepend version byte and nonce to ciphertext
    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_ENCRYPTED); // Version byte for encrypted tokens
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);

    Ok(result)
}

/// Decrypt bytes using AES-256-GCM
pub fn decrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() {
        return Err(CryptoError::EmptyCiphertext);
    }

    // Version marker plus minimum length (version + nonce + tag)
    if ciphertext[0] != VERSION_ENCRYPTED || ciphertext.len() < MIN_ENCRYPTED_LEN {
        return Err(CryptoError::InvalidFormat);
    }

    // Extract components
    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let tag_and_ct = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];

    debug_assert!(tag_and_ct.len() >= TAG_LEN);

    // Reconstruct ciphertext + tag for decryption
    let mut reconstructed = Vec::with_capacity(tag_and_ct.len());
    reconstructed.extend_from_slice(tag_and_ct);

    // Create cipher
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    // Decrypt with AAD
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &reconstructed,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Determine if a payload is using the encrypted format
pub fn is_encrypted_payload(ciphertext: &[u8]) -> bool {
    ciphertext.len() >= MIN_ENCRYPTED_LEN && ciphertext[0] == VERSION_ENCRYPTED
}

/// AAD binding a token to `(organization, provider, owner)`
pub fn integration_aad(organization_id: Uuid, provider: &str, owner_key: &str) -> String {
    format!("{}|{}|{}", organization_id, provider, owner_key)
}

/// AAD binding a workspace token to `(organization, clickup, workspace)`
pub fn workspace_aad(organization_id: Uuid, workspace_id: &str) -> String {
    format!("{}|clickup|workspace:{}", organization_id, workspace_id)
}

/// Encrypt a UTF-8 token under the given AAD
pub fn encrypt_token(key: &CryptoKey, aad: &str, token: &str) -> Result<Vec<u8>, CryptoError> {
    encrypt_bytes(key, aad.as_bytes(), token.as_bytes())
}

/// Decrypt a token previously produced by [`encrypt_token`]
pub fn decrypt_token(key: &CryptoKey, aad: &str, ciphertext: &[u8]) -> Result<String, CryptoError> {
    let bytes = decrypt_bytes(key, aad.as_bytes(), ciphertext)?;
    String::from_utf8(bytes)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
}

/// Type alias for encrypted token result
type EncryptedTokens = Result<(Vec<u8>, Option<Vec<u8>>), CryptoError>;

/// Encrypt the access and optional refresh token of an integration
pub fn encrypt_integration_tokens(
    key: &CryptoKey,
    aad: &str,
    access_token: &str,
    refresh_token: Option<&str>,
) -> EncryptedTokens {
    let access = encrypt_token(key, aad, access_token)?;
    let refresh = refresh_token
        .map(|token| encrypt_token(key, aad, token))
        .transpose()?;
    Ok((access, refresh))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CryptoKey {
        CryptoKey::new(vec![0u8; 32]).expect("valid test key")
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let encrypted = encrypt_bytes(&key, b"aad", b"secret message").expect("encrypts");
        let decrypted = decrypt_bytes(&key, b"aad", &encrypted).expect("decrypts");
        assert_eq!(decrypted, b"secret message");
    }

    #[test]
    fn test_different_aad_fails() {
        let key = test_key();
        let org = Uuid::new_v4();
        let aad = integration_aad(org, "clickup", "organization");
        let encrypted = encrypt_token(&key, &aad, "tok").expect("encrypts");

        let other_org = integration_aad(Uuid::new_v4(), "clickup", "organization");
        assert!(decrypt_token(&key, &other_org, &encrypted).is_err());
        assert_eq!(decrypt_token(&key, &aad, &encrypted).unwrap(), "tok");
    }

    #[test]
    fn test_modified_ciphertext_fails() {
        let key = test_key();
        let mut encrypted = encrypt_bytes(&key, b"aad", b"secret").expect("encrypts");
        encrypted[13] ^= 0x01;
        assert!(decrypt_bytes(&key, b"aad", &encrypted).is_err());
    }

    #[test]
    fn test_nonce_uniqueness() {
        let key = test_key();
        let a = encrypt_bytes(&key, b"aad", b"same").expect("encrypts");
        let b = encrypt_bytes(&key, b"aad", b"same").expect("encrypts");
        assert_ne!(&a[1..13], &b[1..13]);
    }

    #[test]
    fn test_plaintext_is_rejected() {
        let key = test_key();
        let result = decrypt_bytes(&key, b"aad", b"plain-token-value-longer-than-header");
        assert!(matches!(result, Err(CryptoError::InvalidFormat)));
        assert!(!is_encrypted_payload(b"plain"));
    }

    #[test]
    fn test_empty_ciphertext() {
        let key = test_key();
        assert!(matches!(
            decrypt_bytes(&key, b"aad", &[]),
            Err(CryptoError::EmptyCiphertext)
        ));
    }

    #[test]
    fn test_invalid_key_length_rejected() {
        assert!(CryptoKey::new(vec![0u8; 16]).is_err());
        assert!(CryptoKey::new(vec![0u8; 64]).is_err());
    }

    #[test]
    fn test_integration_tokens_share_aad() {
        let key = test_key();
        let aad = integration_aad(Uuid::new_v4(), "clickup", "organization");
        let (access, refresh) =
            encrypt_integration_tokens(&key, &aad, "access", Some("refresh")).expect("encrypts");
        assert!(is_encrypted_payload(&access));
        assert_eq!(decrypt_token(&key, &aad, &access).unwrap(), "access");
        assert_eq!(
            decrypt_token(&key, &aad, refresh.as_ref().unwrap()).unwrap(),
            "refresh"
        );
    }
}
