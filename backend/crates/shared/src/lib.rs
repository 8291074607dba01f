//! Shared Kernel - vocabulary used by every clinic crate
//!
//! This crate contains:
//! - The unified error type ([`error::app_error::AppError`]) and result alias
//! - Error classification ([`error::kind::ErrorKind`]) mapped to HTTP status codes
//! - Typed entity identifiers ([`id::Id`])
//!
//! Nothing in here knows about the hosted database, HTTP clients or crypto.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
