//! Serverless functions client
//!
//! `POST {project}/functions/v1/{name}` with a JSON body and the service key.

use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};

use crate::domain::entity::email_message::{EmailMessage, EmailReceipt};
use crate::domain::entity::payment::{CheckoutSession, PaymentRequest};
use crate::error::{ClinicError, ClinicResult};
use crate::infra::supabase::{SupabaseHttp, ensure_success};

const SERVICE: &str = "functions";

pub const SEND_EMAIL: &str = "send-email";
pub const CREATE_CHECKOUT: &str = "create-checkout";
pub const ENCRYPT_DATA: &str = "encrypt-data";

#[derive(Debug, Clone)]
pub struct FunctionsClient {
    http: SupabaseHttp,
}

impl FunctionsClient {
    pub fn new(http: SupabaseHttp) -> Self {
        Self { http }
    }

    /// Invoke a function and decode its JSON response
    pub async fn invoke<P, R>(&self, name: &str, payload: &P) -> ClinicResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ClinicError::Validation(format!("invalid function name: {name}")));
        }

        let url = self.http.url(&format!("functions/v1/{name}"))?;
        let response = self
            .http
            .request(Method::POST, url)
            .json(payload)
            .send()
            .await?;

        let response = ensure_success(SERVICE, response).await?;
        tracing::debug!(function = name, "Function invoked");
        Ok(response.json().await?)
    }

    pub async fn send_email(&self, message: &EmailMessage) -> ClinicResult<EmailReceipt> {
        let receipt: EmailReceipt = self.invoke(SEND_EMAIL, message).await?;
        tracing::info!(
            email_id = receipt.id.as_deref().unwrap_or("-"),
            attachments = message.attachments.len(),
            "Email sent"
        );
        Ok(receipt)
    }

    pub async fn create_checkout(&self, request: &PaymentRequest) -> ClinicResult<CheckoutSession> {
        request.validate()?;
        let session: CheckoutSession = self.invoke(CREATE_CHECKOUT, request).await?;
        tracing::info!(
            booking_id = %request.booking_id,
            amount = request.amount,
            "Checkout session created"
        );
        Ok(session)
    }
}
