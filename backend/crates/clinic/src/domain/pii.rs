//! PII columns per table
//!
//! Every column listed here is stored encrypted.

pub const CUSTOMERS: &str = "customers";
pub const BOOKINGS: &str = "bookings";
pub const INVOICES: &str = "invoices";

const CUSTOMER_FIELDS: &[&str] = &[
    "phone",
    "address",
    "date_of_birth",
    "emergency_contact",
    "medical_notes",
];

const BOOKING_FIELDS: &[&str] = &["notes", "health_notes"];

const INVOICE_FIELDS: &[&str] = &["billing_address"];

/// Encrypted columns of `table`; empty for tables without PII
pub fn pii_fields(table: &str) -> &'static [&'static str] {
    match table {
        CUSTOMERS => CUSTOMER_FIELDS,
        BOOKINGS => BOOKING_FIELDS,
        INVOICES => INVOICE_FIELDS,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pii_fields() {
        assert!(pii_fields(CUSTOMERS).contains(&"medical_notes"));
        assert_eq!(pii_fields(BOOKINGS), &["notes", "health_notes"]);
        assert_eq!(pii_fields(INVOICES), &["billing_address"]);
        assert!(pii_fields("audit_logs").is_empty());
    }
}
