//! Checkout request/response of the `create-checkout` function

use kernel::id::BookingId;
use platform::sanitize::sanitize_url;
use serde::{Deserialize, Serialize};

use crate::error::{ClinicError, ClinicResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    pub booking_id: BookingId,
    /// Amount in minor units (pence, cents)
    pub amount: i64,
    /// ISO 4217, lower-case as the payment provider expects
    pub currency: String,
    pub customer_email: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl PaymentRequest {
    /// Reject requests the payment provider would refuse anyway
    pub fn validate(&self) -> ClinicResult<()> {
        if self.amount <= 0 {
            return Err(ClinicError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(ClinicError::Validation(format!(
                "invalid currency code: {}",
                self.currency
            )));
        }
        for (name, url) in [("success_url", &self.success_url), ("cancel_url", &self.cancel_url)] {
            if sanitize_url(url).is_empty() {
                return Err(ClinicError::Validation(format!("{name} must be an http(s) URL")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    #[serde(alias = "sessionId")]
    pub session_id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            booking_id: BookingId::new(),
            amount: 6500,
            currency: "gbp".to_string(),
            customer_email: "client@example.com".to_string(),
            description: "60 min deep tissue".to_string(),
            success_url: "https://clinic.example/paid".to_string(),
            cancel_url: "https://clinic.example/cancelled".to_string(),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_invalid_requests() {
        let mut r = request();
        r.amount = 0;
        assert!(matches!(r.validate(), Err(ClinicError::Validation(_))));

        let mut r = request();
        r.currency = "GBP".to_string();
        assert!(r.validate().is_err());

        let mut r = request();
        r.success_url = "javascript:alert(1)".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_checkout_session_accepts_camel_case() {
        let session: CheckoutSession =
            serde_json::from_str(r#"{"sessionId":"cs_test_1","url":"https://pay.example/cs_test_1"}"#)
                .unwrap();
        assert_eq!(session.session_id, "cs_test_1");
    }
}
