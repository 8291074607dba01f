//! Platform Crate - Technical Infrastructure
//!
//! This crate provides the technical foundations of the clinic backend:
//! - Cryptographic utilities (SHA-256, SHA-1, Base64)
//! - Password hashing (Argon2id)
//! - Login rate limiting (sliding window + lockout)
//! - Breach detection (HIBP email lookup, k-Anonymity password range query)
//! - GDPR field-level encryption (AES-256-GCM)
//! - Input sanitization per field class
//! - Request context extraction for audit logs
//! - Environment configuration

pub mod breach;
pub mod client;
pub mod config;
pub mod crypto;
pub mod field_crypto;
pub mod password;
pub mod rate_limit;
pub mod sanitize;
