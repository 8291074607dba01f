//! Email composition
//!
//! Builds the messages handed to the `send-email` function. Every
//! interpolated value is HTML-escaped.

use chrono::{DateTime, Utc};
use platform::sanitize::escape_html;

use crate::application::invoice::{Invoice, format_money};
use crate::domain::entity::email_message::{EmailAttachment, EmailMessage};

/// Details shown in a booking confirmation
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub customer_name: String,
    pub customer_email: String,
    pub service_name: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub location: Option<String>,
    /// Address clients reply to, usually the clinic inbox
    pub reply_to: Option<String>,
}

pub fn booking_confirmation(booking: &BookingConfirmation) -> EmailMessage {
    let when = booking.starts_at.format("%A %d %B %Y at %H:%M UTC");
    let location = booking
        .location
        .as_deref()
        .map(|l| format!("<p>Where: {}</p>", escape_html(l)))
        .unwrap_or_default();

    let html = format!(
        "<p>Hi {name},</p>\
         <p>Your {service} is confirmed for {when} ({minutes} minutes).</p>\
         {location}\
         <p>Reply to this email if you need to change your appointment.</p>",
        name = escape_html(&booking.customer_name),
        service = escape_html(&booking.service_name),
        minutes = booking.duration_minutes,
    );

    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Booking confirmed: {}", booking.service_name),
        html,
        reply_to: booking.reply_to.clone(),
        attachments: Vec::new(),
    }
}

/// Invoice email, with the rendered PDF attached when available
pub fn invoice_email(invoice: &Invoice, pdf: Option<&[u8]>) -> EmailMessage {
    let total = format_money(invoice.total(), &invoice.currency);
    let body_note = if pdf.is_some() {
        "<p>Your invoice is attached.</p>"
    } else {
        "<p>Reply to this email if you need a PDF copy.</p>"
    };

    let html = format!(
        "<p>Hi {name},</p>\
         <p>Invoice {number} for {total} was issued on {issued}.</p>\
         {body_note}",
        name = escape_html(&invoice.customer_name),
        number = escape_html(&invoice.number),
        total = escape_html(&total),
        issued = invoice.issued_on.format("%d %B %Y"),
    );

    let attachments = pdf
        .map(|bytes| vec![EmailAttachment::pdf(format!("{}.pdf", invoice.number), bytes)])
        .unwrap_or_default();

    EmailMessage {
        to: invoice.customer_email.clone(),
        subject: format!("Invoice {}", invoice.number),
        html,
        reply_to: None,
        attachments,
    }
}
