//! Application Layer
//!
//! Use cases and the services admin handlers call.

pub mod audit;
pub mod config;
pub mod email;
pub mod gdpr;
pub mod invoice;
pub mod sign_in;

// Re-exports
pub use audit::AuditLogger;
pub use config::ClinicConfig;
pub use email::{BookingConfirmation, booking_confirmation, invoice_email};
pub use gdpr::{decrypt_record, decrypt_records, encrypt_record};
pub use invoice::{Invoice, InvoiceDocument, InvoiceRenderer, LineItem, load_logo, render_invoice};
pub use sign_in::{AdminSignInInput, AdminSignInOutput, AdminSignInUseCase};
