//! Outgoing email, as accepted by the `send-email` function

use platform::crypto::to_base64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub filename: String,
    /// Base64 of the file bytes
    pub content: String,
    pub content_type: String,
}

impl EmailAttachment {
    pub fn pdf(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            content: to_base64(bytes),
            content_type: "application/pdf".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    /// HTML body; interpolated values are already escaped
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<EmailAttachment>,
}

/// Response of the `send-email` function
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmailReceipt {
    #[serde(default)]
    pub id: Option<String>,
}
