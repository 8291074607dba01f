//! Error conversions - `From` implementations into [`AppError`]

use super::app_error::AppError;

// ============================================================================
// serde_json conversions
// ============================================================================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() {
            AppError::bad_request(format!("JSON parse error: {}", err)).with_source(err)
        } else {
            AppError::internal("JSON serialization error").with_source(err)
        }
    }
}

// ============================================================================
// reqwest conversions (feature-gated)
// ============================================================================

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::gateway_timeout("Upstream service timed out").with_source(err)
        } else if err.is_connect() {
            AppError::service_unavailable("Upstream service unreachable").with_source(err)
        } else if err.is_builder() {
            AppError::internal("Invalid upstream request").with_source(err)
        } else if let Some(status) = err.status() {
            let message = format!("Upstream service returned {}", status.as_u16());
            AppError::bad_gateway(message).with_source(err)
        } else if err.is_decode() {
            AppError::bad_gateway("Malformed upstream response").with_source(err)
        } else {
            AppError::bad_gateway("Upstream request failed").with_source(err)
        }
    }
}
