//! GDPR record helpers
//!
//! Encrypts and decrypts the PII columns of a row before it is written to
//! or after it is read from the hosted store.
//!
//! Writes fail closed: a field that cannot be encrypted aborts the write.
//! Reads are lenient: a field that cannot be decrypted stays as stored.

use std::sync::Arc;

use platform::field_crypto::{FieldCipher, is_data_encrypted};
use serde_json::Value;
use tokio::task::JoinSet;

use crate::domain::pii::pii_fields;
use crate::domain::repository::Row;
use crate::error::{ClinicError, ClinicResult};

/// Encrypt every non-empty PII string of `record` in place
///
/// Returns how many fields were encrypted.
pub async fn encrypt_record<C>(cipher: &C, table: &str, record: &mut Row) -> ClinicResult<usize>
where
    C: FieldCipher + Sync,
{
    let mut encrypted = 0;
    for field in pii_fields(table) {
        let Some(Value::String(plain)) = record.get(*field) else {
            continue;
        };
        if plain.is_empty() || is_data_encrypted(plain) {
            continue;
        }

        let ciphertext = cipher.encrypt_field(plain).await.map_err(|e| {
            tracing::error!(table, field, error = %e, "PII encryption failed, write aborted");
            ClinicError::Encryption(e)
        })?;
        record.insert(field.to_string(), Value::String(ciphertext));
        encrypted += 1;
    }
    Ok(encrypted)
}

/// Decrypt the encrypted PII strings of `record` in place
///
/// Returns how many fields could not be decrypted and were left as stored.
pub async fn decrypt_record<C>(cipher: &C, table: &str, record: &mut Row) -> usize
where
    C: FieldCipher + Sync,
{
    let mut failed = 0;
    for field in pii_fields(table) {
        let Some(Value::String(stored)) = record.get(*field) else {
            continue;
        };
        if !is_data_encrypted(stored) {
            continue;
        }

        match cipher.decrypt_field(stored).await {
            Ok(plain) => {
                record.insert(field.to_string(), Value::String(plain));
            }
            Err(e) => {
                tracing::warn!(table, field, error = %e, "PII decryption failed, keeping stored value");
                failed += 1;
            }
        }
    }
    failed
}

/// Decrypt a batch of rows, one task per row, preserving order
pub async fn decrypt_records<C>(
    cipher: Arc<C>,
    table: &str,
    records: Vec<Row>,
) -> ClinicResult<Vec<Row>>
where
    C: FieldCipher + Send + Sync + 'static,
{
    let total = records.len();
    let mut tasks = JoinSet::new();
    for (index, mut record) in records.into_iter().enumerate() {
        let cipher = Arc::clone(&cipher);
        let table = table.to_string();
        tasks.spawn(async move {
            decrypt_record(cipher.as_ref(), &table, &mut record).await;
            (index, record)
        });
    }

    let mut slots: Vec<Option<Row>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        let (index, record) = joined
            .map_err(|e| ClinicError::Internal(format!("decrypt task failed: {e}")))?;
        slots[index] = Some(record);
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::field_crypto::{AesFieldCipher, FieldCryptoError, FieldKey};
    use serde_json::json;

    use crate::domain::pii::{BOOKINGS, CUSTOMERS};
    use crate::infra::memory::row_from;

    fn cipher() -> AesFieldCipher {
        AesFieldCipher::new(&FieldKey::generate()).unwrap()
    }

    fn customer() -> Row {
        row_from(json!({
            "id": "c-1",
            "name": "Ana Lima",
            "phone": "07700 900123",
            "address": "",
            "date_of_birth": "1990-04-01",
            "medical_notes": "Lower back pain",
            "emergency_contact": null
        }))
    }

    #[tokio::test]
    async fn test_encrypt_record_only_touches_pii() {
        let cipher = cipher();
        let mut record = customer();

        let count = encrypt_record(&cipher, CUSTOMERS, &mut record).await.unwrap();
        assert_eq!(count, 3);

        assert_eq!(record["name"], "Ana Lima");
        assert_eq!(record["address"], "");
        assert_eq!(record["emergency_contact"], Value::Null);
        assert!(is_data_encrypted(record["phone"].as_str().unwrap()));
        assert!(is_data_encrypted(record["medical_notes"].as_str().unwrap()));

        // Second pass is a no-op
        let before = record.clone();
        assert_eq!(encrypt_record(&cipher, CUSTOMERS, &mut record).await.unwrap(), 0);
        assert_eq!(record, before);
    }

    #[tokio::test]
    async fn test_decrypt_record_restores_plaintext() {
        let cipher = cipher();
        let mut record = customer();
        encrypt_record(&cipher, CUSTOMERS, &mut record).await.unwrap();

        assert_eq!(decrypt_record(&cipher, CUSTOMERS, &mut record).await, 0);
        assert_eq!(record, customer());
    }

    #[tokio::test]
    async fn test_decrypt_with_wrong_key_keeps_stored_value() {
        let mut record = customer();
        encrypt_record(&cipher(), CUSTOMERS, &mut record).await.unwrap();
        let stored_phone = record["phone"].clone();

        let failed = decrypt_record(&cipher(), CUSTOMERS, &mut record).await;
        assert_eq!(failed, 3);
        assert_eq!(record["phone"], stored_phone);
    }

    #[tokio::test]
    async fn test_tables_without_pii_are_untouched() {
        let mut record = row_from(json!({ "action": "booking.update", "notes": "x" }));
        let count = encrypt_record(&cipher(), "audit_logs", &mut record).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(record["notes"], "x");
    }

    struct BrokenCipher;

    impl FieldCipher for BrokenCipher {
        async fn encrypt_field(&self, _plaintext: &str) -> Result<String, FieldCryptoError> {
            Err(FieldCryptoError::EncryptionFailed)
        }

        async fn decrypt_field(&self, _value: &str) -> Result<String, FieldCryptoError> {
            Err(FieldCryptoError::DecryptionFailed)
        }
    }

    #[tokio::test]
    async fn test_encryption_failure_fails_closed() {
        let mut record = row_from(json!({ "notes": "Prefers firm pressure" }));
        let err = encrypt_record(&BrokenCipher, BOOKINGS, &mut record)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClinicError::Encryption(FieldCryptoError::EncryptionFailed)
        ));
    }

    #[tokio::test]
    async fn test_decrypt_records_preserves_order() {
        let cipher = Arc::new(cipher());
        let mut records = Vec::new();
        for i in 0..20 {
            let mut record = row_from(json!({ "id": i, "notes": format!("note {i}") }));
            encrypt_record(cipher.as_ref(), BOOKINGS, &mut record).await.unwrap();
            records.push(record);
        }

        let decrypted = decrypt_records(cipher, BOOKINGS, records).await.unwrap();
        assert_eq!(decrypted.len(), 20);
        for (i, record) in decrypted.iter().enumerate() {
            assert_eq!(record["id"], i);
            assert_eq!(record["notes"], format!("note {i}"));
        }
    }
}
