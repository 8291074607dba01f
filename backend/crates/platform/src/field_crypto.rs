//! GDPR Field Encryption
//!
//! AES-256-GCM encryption of individual PII fields.
//!
//! Stored format: `enc:v1:` followed by base64(nonce || ciphertext || tag),
//! with a fresh 96-bit nonce per value.
//!
//! ## Rules
//! - Encrypting a value that already looks encrypted is a no-op
//! - Decrypting a value without the marker returns it unchanged
//! - Encryption failures propagate; plaintext is never returned in place of
//!   ciphertext

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{from_base64, to_base64};

/// Marker prepended to every value this module encrypts
pub const ENCRYPTED_PREFIX: &str = "enc:v1:";

/// Unmarked values at least this long that look like base64 are treated as
/// ciphertext written by the server-side encryption function
const UNMARKED_CIPHERTEXT_MIN_LEN: usize = 64;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum FieldCryptoError {
    #[error("Encryption key must be 32 bytes (got {0})")]
    InvalidKeyLength(usize),

    #[error("Encryption key is not valid base64")]
    InvalidKeyEncoding,

    #[error("Field encryption failed")]
    EncryptionFailed,

    #[error("Field decryption failed")]
    DecryptionFailed,

    #[error("Malformed ciphertext: {0}")]
    Malformed(&'static str),

    #[error("Remote encryption service failed: {0}")]
    Remote(String),
}

/// 256-bit field encryption key, zeroized on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FieldKey([u8; KEY_LEN]);

impl FieldKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FieldCryptoError> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| FieldCryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(key))
    }

    /// Parse the base64 form used in `GDPR_ENCRYPTION_KEY`
    pub fn from_base64(encoded: &str) -> Result<Self, FieldCryptoError> {
        let mut bytes =
            from_base64(encoded.trim()).map_err(|_| FieldCryptoError::InvalidKeyEncoding)?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Random key (development and tests)
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldKey").field(&"[REDACTED]").finish()
    }
}

/// Heuristic check for already-encrypted values
///
/// True for anything carrying [`ENCRYPTED_PREFIX`], and for long unmarked
/// strings made only of the base64 alphabet.
pub fn is_data_encrypted(value: &str) -> bool {
    if value.starts_with(ENCRYPTED_PREFIX) {
        return true;
    }

    value.len() >= UNMARKED_CIPHERTEXT_MIN_LEN
        && value.len() % 4 == 0
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

/// Trait for field encryption backends
#[trait_variant::make(FieldCipher: Send)]
pub trait LocalFieldCipher {
    async fn encrypt_field(&self, plaintext: &str) -> Result<String, FieldCryptoError>;

    async fn decrypt_field(&self, value: &str) -> Result<String, FieldCryptoError>;
}

/// In-process AES-256-GCM cipher
#[derive(Clone)]
pub struct AesFieldCipher {
    cipher: Aes256Gcm,
}

impl AesFieldCipher {
    pub fn new(key: &FieldKey) -> Result<Self, FieldCryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| FieldCryptoError::InvalidKeyLength(key.as_bytes().len()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, FieldCryptoError> {
        if is_data_encrypted(plaintext) {
            return Ok(plaintext.to_string());
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| FieldCryptoError::EncryptionFailed)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", ENCRYPTED_PREFIX, to_base64(&combined)))
    }

    pub fn decrypt(&self, value: &str) -> Result<String, FieldCryptoError> {
        let Some(encoded) = value.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(value.to_string());
        };

        let combined =
            from_base64(encoded).map_err(|_| FieldCryptoError::Malformed("invalid base64"))?;
        if combined.len() <= NONCE_LEN {
            return Err(FieldCryptoError::Malformed("ciphertext too short"));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| FieldCryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| FieldCryptoError::Malformed("not UTF-8"))
    }
}

impl fmt::Debug for AesFieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesFieldCipher").finish_non_exhaustive()
    }
}

impl FieldCipher for AesFieldCipher {
    async fn encrypt_field(&self, plaintext: &str) -> Result<String, FieldCryptoError> {
        self.encrypt(plaintext)
    }

    async fn decrypt_field(&self, value: &str) -> Result<String, FieldCryptoError> {
        self.decrypt(value)
    }
}
