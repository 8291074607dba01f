//! Domain Entities

pub mod admin;
pub mod audit_entry;
pub mod email_message;
pub mod payment;
