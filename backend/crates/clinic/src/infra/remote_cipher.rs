//! Field encryption through the `encrypt-data` function
//!
//! Used when the key lives only in the functions runtime.

use platform::field_crypto::{FieldCipher, FieldCryptoError, is_data_encrypted};
use serde::{Deserialize, Serialize};

use crate::infra::functions::{ENCRYPT_DATA, FunctionsClient};

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum CipherAction {
    Encrypt,
    Decrypt,
}

#[derive(Serialize)]
struct CipherRequest<'a> {
    action: CipherAction,
    data: &'a str,
}

#[derive(Deserialize)]
struct CipherResponse {
    result: String,
}

#[derive(Debug, Clone)]
pub struct RemoteFieldCipher {
    functions: FunctionsClient,
}

impl RemoteFieldCipher {
    pub fn new(functions: FunctionsClient) -> Self {
        Self { functions }
    }

    async fn call(&self, action: CipherAction, data: &str) -> Result<String, FieldCryptoError> {
        let response: CipherResponse = self
            .functions
            .invoke(ENCRYPT_DATA, &CipherRequest { action, data })
            .await
            .map_err(|e| FieldCryptoError::Remote(e.to_string()))?;
        Ok(response.result)
    }
}

impl FieldCipher for RemoteFieldCipher {
    async fn encrypt_field(&self, plaintext: &str) -> Result<String, FieldCryptoError> {
        if is_data_encrypted(plaintext) {
            return Ok(plaintext.to_string());
        }
        let encrypted = self.call(CipherAction::Encrypt, plaintext).await?;
        if encrypted == plaintext {
            return Err(FieldCryptoError::Remote(
                "encryption function returned the plaintext".to_string(),
            ));
        }
        Ok(encrypted)
    }

    async fn decrypt_field(&self, value: &str) -> Result<String, FieldCryptoError> {
        if !is_data_encrypted(value) {
            return Ok(value.to_string());
        }
        self.call(CipherAction::Decrypt, value).await
    }
}
