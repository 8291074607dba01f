//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-1 digest as uppercase hex (the Pwned Passwords alphabet)
pub fn sha1_hex_upper(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex_encode_upper(&hasher.finalize())
}

/// Encode bytes as base64
pub fn to_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 to bytes
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(s)
}

/// Short, stable pseudonym for an email address
///
/// Log lines carry this instead of the address itself.
pub fn email_fingerprint(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = sha256(normalized.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Encode bytes as uppercase hex string
pub fn hex_encode_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_values() {
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);
    }

    #[test]
    fn test_sha1_hex_upper_known_value() {
        // SHA-1("password")
        assert_eq!(
            sha1_hex_upper(b"password"),
            "5BAA61E4C9B93F3F0682250B6CF8331B7EE68FD8"
        );
    }

    #[test]
    fn test_base64_roundtrip() {
        let data = b"07700 900123";
        assert_eq!(from_base64(&to_base64(data)).unwrap(), data);
    }

    #[test]
    fn test_email_fingerprint_is_case_insensitive() {
        let a = email_fingerprint("User@Example.com");
        let b = email_fingerprint(" user@example.com ");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(!a.contains('@'));
    }

    #[test]
    fn test_hex_encode_upper() {
        assert_eq!(hex_encode_upper(&[0xab, 0xcd, 0xef]), "ABCDEF");
    }
}
