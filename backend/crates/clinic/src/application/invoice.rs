//! Invoice assembly
//!
//! Totals in minor units, the document handed to the PDF renderer, and the
//! clinic logo fetch. A missing logo never stops an invoice.

use chrono::NaiveDate;
use kernel::id::InvoiceId;
use platform::sanitize::sanitize_url;
use reqwest::header::CONTENT_TYPE;

use crate::error::{ClinicError, ClinicResult};

/// Largest logo accepted, in bytes
pub const MAX_LOGO_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub description: String,
    pub quantity: u32,
    /// Price of one unit in minor units
    pub unit_price: i64,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: u32, unit_price: i64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    /// Line total, `None` when it does not fit in an `i64`
    pub fn checked_amount(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }

    /// Line total, saturating at the `i64` bounds
    pub fn amount(&self) -> i64 {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub invoice_id: InvoiceId,
    /// Human-facing number, e.g. `INV-2026-0042`
    pub number: String,
    pub issued_on: NaiveDate,
    pub due_on: Option<NaiveDate>,
    pub customer_name: String,
    pub customer_email: String,
    pub billing_address: Option<String>,
    /// ISO 4217, upper-case
    pub currency: String,
    /// VAT rate in basis points (2000 = 20%)
    pub vat_rate_bps: u32,
    pub items: Vec<LineItem>,
}

impl Invoice {
    pub fn validate(&self) -> ClinicResult<()> {
        if self.items.is_empty() {
            return Err(ClinicError::Validation("invoice has no line items".to_string()));
        }
        if self.items.iter().any(|item| item.quantity == 0) {
            return Err(ClinicError::Validation(
                "line item quantity must be at least 1".to_string(),
            ));
        }
        if self.checked_total().is_none() {
            return Err(ClinicError::Validation(
                "invoice amounts exceed the supported range".to_string(),
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ClinicError::Validation(format!(
                "invalid currency code: {}",
                self.currency
            )));
        }
        Ok(())
    }

    pub fn checked_subtotal(&self) -> Option<i64> {
        self.items
            .iter()
            .try_fold(0i64, |acc, item| acc.checked_add(item.checked_amount()?))
    }

    /// Subtotal plus VAT, `None` when any step overflows
    pub fn checked_total(&self) -> Option<i64> {
        let subtotal = self.checked_subtotal()?;
        subtotal.checked_add(vat_on(subtotal, self.vat_rate_bps)?)
    }

    /// Saturating subtotal; [`validate`](Self::validate) rejects invoices where it saturates
    pub fn subtotal(&self) -> i64 {
        self.items
            .iter()
            .fold(0i64, |acc, item| acc.saturating_add(item.amount()))
    }

    /// VAT on the subtotal, rounded half away from zero
    pub fn vat(&self) -> i64 {
        let subtotal = self.subtotal();
        vat_on(subtotal, self.vat_rate_bps).unwrap_or(if subtotal < 0 { i64::MIN } else { i64::MAX })
    }

    pub fn total(&self) -> i64 {
        self.subtotal().saturating_add(self.vat())
    }

    /// Everything the renderer prints, already formatted
    pub fn document(&self, logo: Option<Vec<u8>>) -> InvoiceDocument {
        let lines = self
            .items
            .iter()
            .map(|item| DocumentLine {
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: format_money(item.unit_price, &self.currency),
                amount: format_money(item.amount(), &self.currency),
            })
            .collect();

        InvoiceDocument {
            number: self.number.clone(),
            issued_on: self.issued_on.format("%d %B %Y").to_string(),
            due_on: self.due_on.map(|d| d.format("%d %B %Y").to_string()),
            customer_name: self.customer_name.clone(),
            billing_address: self.billing_address.clone(),
            lines,
            subtotal: format_money(self.subtotal(), &self.currency),
            vat_label: format!("VAT ({})", format_rate(self.vat_rate_bps)),
            vat: format_money(self.vat(), &self.currency),
            total: format_money(self.total(), &self.currency),
            logo,
        }
    }
}

fn vat_on(subtotal: i64, rate_bps: u32) -> Option<i64> {
    let scaled = i128::from(subtotal) * i128::from(rate_bps);
    let half = if scaled < 0 { -5_000 } else { 5_000 };
    i64::try_from((scaled + half) / 10_000).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: String,
    pub amount: String,
}

/// Renderer input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    pub number: String,
    pub issued_on: String,
    pub due_on: Option<String>,
    pub customer_name: String,
    pub billing_address: Option<String>,
    pub lines: Vec<DocumentLine>,
    pub subtotal: String,
    pub vat_label: String,
    pub vat: String,
    pub total: String,
    /// Raw image bytes, `None` renders without a logo
    pub logo: Option<Vec<u8>>,
}

/// PDF rendering backend
pub trait InvoiceRenderer {
    fn render(&self, document: &InvoiceDocument) -> ClinicResult<Vec<u8>>;
}

/// `1234` in GBP -> `£12.34`
pub fn format_money(minor: i64, currency: &str) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let amount = format!("{}.{:02}", abs / 100, abs % 100);
    match currency {
        "GBP" => format!("{sign}£{amount}"),
        "EUR" => format!("{sign}€{amount}"),
        "USD" => format!("{sign}${amount}"),
        code => format!("{sign}{code} {amount}"),
    }
}

/// `2000` -> `20%`, `550` -> `5.5%`
fn format_rate(bps: u32) -> String {
    let whole = bps / 100;
    let frac = bps % 100;
    if frac == 0 {
        format!("{whole}%")
    } else if frac % 10 == 0 {
        format!("{whole}.{}%", frac / 10)
    } else {
        format!("{whole}.{frac:02}%")
    }
}

/// Fetch the clinic logo for the invoice header
///
/// Returns `None` with a warning on a bad URL, transport error, non-2xx
/// status, non-image content or an oversized body.
pub async fn load_logo(client: &reqwest::Client, url: &str) -> Option<Vec<u8>> {
    let clean = sanitize_url(url);
    if clean.is_empty() {
        tracing::warn!(url, "Logo URL rejected, rendering without logo");
        return None;
    }

    let response = match client.get(&clean).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %clean, error = %e, "Logo fetch failed, rendering without logo");
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(url = %clean, status = status.as_u16(), "Logo fetch returned an error status");
        return None;
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("image/") {
        tracing::warn!(url = %clean, content_type = %content_type, "Logo is not an image");
        return None;
    }

    match response.bytes().await {
        Ok(bytes) if bytes.len() <= MAX_LOGO_BYTES => Some(bytes.to_vec()),
        Ok(bytes) => {
            tracing::warn!(url = %clean, size = bytes.len(), "Logo too large");
            None
        }
        Err(e) => {
            tracing::warn!(url = %clean, error = %e, "Logo body could not be read");
            None
        }
    }
}

/// Validate, fetch the logo (optional) and render
pub async fn render_invoice<R: InvoiceRenderer>(
    renderer: &R,
    client: &reqwest::Client,
    invoice: &Invoice,
    logo_url: Option<&str>,
) -> ClinicResult<Vec<u8>> {
    invoice.validate()?;

    let logo = match logo_url {
        Some(url) => load_logo(client, url).await,
        None => None,
    };
    let document = invoice.document(logo);
    let pdf = renderer.render(&document)?;

    tracing::info!(
        invoice_id = %invoice.invoice_id,
        number = %invoice.number,
        with_logo = document.logo.is_some(),
        size = pdf.len(),
        "Invoice rendered"
    );
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::{Router, http::header, routing::get};

    use crate::test_support::spawn_stub;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nlogo";

    fn invoice() -> Invoice {
        Invoice {
            invoice_id: InvoiceId::new(),
            number: "INV-2026-0042".to_string(),
            issued_on: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            due_on: NaiveDate::from_ymd_opt(2026, 10, 29),
            customer_name: "Ana Lima".to_string(),
            customer_email: "ana@example.com".to_string(),
            billing_address: Some("1 High Street".to_string()),
            currency: "GBP".to_string(),
            vat_rate_bps: 2000,
            items: vec![
                LineItem::new("Deep tissue massage (60 min)", 1, 6500),
                LineItem::new("Hot stones add-on", 2, 1000),
            ],
        }
    }

    #[test]
    fn test_totals() {
        let invoice = invoice();
        assert_eq!(invoice.subtotal(), 8500);
        assert_eq!(invoice.vat(), 1700);
        assert_eq!(invoice.total(), 10200);
    }

    #[test]
    fn test_vat_rounding() {
        let mut invoice = invoice();
        invoice.items = vec![LineItem::new("Consultation", 1, 1999)];
        // 399.8 -> 400
        assert_eq!(invoice.vat(), 400);

        invoice.items = vec![LineItem::new("Consultation", 1, 1002)];
        invoice.vat_rate_bps = 550;
        // 55.11 -> 55
        assert_eq!(invoice.vat(), 55);

        invoice.items = vec![LineItem::new("Refund", 1, -1999)];
        invoice.vat_rate_bps = 2000;
        assert_eq!(invoice.vat(), -400);
    }

    #[test]
    fn test_validate() {
        assert!(invoice().validate().is_ok());

        let mut empty = invoice();
        empty.items.clear();
        assert!(matches!(empty.validate(), Err(ClinicError::Validation(_))));

        let mut zero = invoice();
        zero.items[0].quantity = 0;
        assert!(zero.validate().is_err());

        let mut currency = invoice();
        currency.currency = "gbp".to_string();
        assert!(currency.validate().is_err());
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        let mut huge = invoice();
        huge.items = vec![LineItem::new("x", u32::MAX, i64::MAX / 1000)];

        assert_eq!(huge.items[0].checked_amount(), None);
        assert_eq!(huge.items[0].amount(), i64::MAX);
        assert_eq!(huge.checked_total(), None);
        assert_eq!(huge.total(), i64::MAX);
        assert!(matches!(huge.validate(), Err(ClinicError::Validation(_))));

        // Each line fits, their sum does not
        let mut summed = invoice();
        summed.items = vec![
            LineItem::new("a", 1, i64::MAX - 10),
            LineItem::new("b", 1, 20),
        ];
        assert!(summed.items.iter().all(|i| i.checked_amount().is_some()));
        assert_eq!(summed.checked_subtotal(), None);
        assert!(summed.validate().is_err());

        // Subtotal fits, VAT pushes the total over
        let mut taxed = invoice();
        taxed.items = vec![LineItem::new("a", 1, i64::MAX / 2)];
        taxed.vat_rate_bps = 20_000;
        assert!(taxed.checked_subtotal().is_some());
        assert!(taxed.validate().is_err());
        assert_eq!(taxed.total(), i64::MAX);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_money(1234, "GBP"), "£12.34");
        assert_eq!(format_money(-5, "EUR"), "-€0.05");
        assert_eq!(format_money(100000, "CHF"), "CHF 1000.00");
        assert_eq!(format_rate(2000), "20%");
        assert_eq!(format_rate(550), "5.5%");
        assert_eq!(format_rate(1275), "12.75%");
    }

    #[test]
    fn test_document() {
        let doc = invoice().document(None);
        assert_eq!(doc.issued_on, "15 October 2026");
        assert_eq!(doc.lines.len(), 2);
        assert_eq!(doc.lines[1].amount, "£20.00");
        assert_eq!(doc.vat_label, "VAT (20%)");
        assert_eq!(doc.total, "£102.00");
    }

    async fn logo_server() -> String {
        let router = Router::new()
            .route("/logo.png", get(|| async { ([(header::CONTENT_TYPE, "image/png")], PNG) }))
            .route("/page", get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html>") }))
            .route(
                "/huge.png",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "image/png")],
                        vec![0u8; MAX_LOGO_BYTES + 1],
                    )
                }),
            );
        spawn_stub(router).await
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_logo() {
        let base = logo_server().await;
        let client = client();

        assert_eq!(
            load_logo(&client, &format!("{base}/logo.png")).await.as_deref(),
            Some(PNG)
        );
        assert!(load_logo(&client, &format!("{base}/missing.png")).await.is_none());
        assert!(load_logo(&client, &format!("{base}/page")).await.is_none());
        assert!(load_logo(&client, &format!("{base}/huge.png")).await.is_none());
        assert!(load_logo(&client, "javascript:alert(1)").await.is_none());
        assert!(load_logo(&client, "http://127.0.0.1:1/logo.png").await.is_none());
    }

    #[derive(Default)]
    struct CapturingRenderer {
        seen: Mutex<Option<InvoiceDocument>>,
    }

    impl InvoiceRenderer for CapturingRenderer {
        fn render(&self, document: &InvoiceDocument) -> ClinicResult<Vec<u8>> {
            *self.seen.lock().unwrap() = Some(document.clone());
            Ok(b"%PDF-1.7".to_vec())
        }
    }

    #[tokio::test]
    async fn test_render_invoice_fails_open_on_logo() {
        let renderer = CapturingRenderer::default();
        let client = client();

        let pdf = render_invoice(
            &renderer,
            &client,
            &invoice(),
            Some("http://127.0.0.1:1/logo.png"),
        )
        .await
        .unwrap();

        assert_eq!(pdf, b"%PDF-1.7");
        let seen = renderer.seen.lock().unwrap().clone().unwrap();
        assert!(seen.logo.is_none());
        assert_eq!(seen.number, "INV-2026-0042");
    }

    #[tokio::test]
    async fn test_render_invoice_with_logo() {
        let base = logo_server().await;
        let renderer = CapturingRenderer::default();

        render_invoice(
            &renderer,
            &client(),
            &invoice(),
            Some(&format!("{base}/logo.png")),
        )
        .await
        .unwrap();

        let seen = renderer.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.logo.as_deref(), Some(PNG));
    }
}
