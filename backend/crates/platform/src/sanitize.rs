//! Input Sanitization
//!
//! Cleans user-supplied values before they are written, one rule set per
//! field class. Sanitizing never fails; values that cannot be salvaged
//! become empty strings.

use std::collections::HashSet;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PHONE_LEN: usize = 20;
pub const MAX_TEXT_LEN: usize = 5000;

/// What a field holds, which decides how it is cleaned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    Name,
    Email,
    Phone,
    Text,
    Url,
}

/// Sanitize a single value
pub fn sanitize(input: &str, class: FieldClass) -> String {
    match class {
        FieldClass::Name => sanitize_name(input),
        FieldClass::Email => sanitize_email(input),
        FieldClass::Phone => sanitize_phone(input),
        FieldClass::Text => sanitize_text(input),
        FieldClass::Url => sanitize_url(input),
    }
}

/// Sanitize the listed string fields of a JSON object in place
///
/// Missing fields and non-string values are left alone.
pub fn sanitize_fields(record: &mut Map<String, Value>, fields: &[(&str, FieldClass)]) {
    for (field, class) in fields {
        if let Some(Value::String(value)) = record.get_mut(*field) {
            *value = sanitize(value, *class);
        }
    }
}

/// Letters, combining marks, spaces, hyphens, apostrophes and periods
///
/// Markup is parsed rather than pattern-matched, so entities decode to the
/// characters they stand for and script or style content is dropped.
pub fn sanitize_name(input: &str) -> String {
    let text = ammonia::Builder::empty().clean(input).to_string();
    let kept: String = unescape_text(&text)
        .chars()
        .filter(|c| {
            c.is_alphabetic()
                || is_combining_mark(*c)
                || c.is_whitespace()
                || matches!(c, '-' | '\'' | '.')
        })
        .collect();

    truncate_chars(&collapse_whitespace(&kept), MAX_NAME_LEN)
}

pub fn sanitize_email(input: &str) -> String {
    let kept: String = input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '%' | '+' | '-'))
        .collect();

    truncate_chars(&kept, MAX_EMAIL_LEN)
}

pub fn sanitize_phone(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .collect();

    truncate_chars(kept.trim(), MAX_PHONE_LEN)
        .trim_end()
        .to_string()
}

/// Remove every tag (dropping script/style content entirely)
///
/// The result is HTML-escaped text, safe to render.
pub fn sanitize_text(input: &str) -> String {
    let cleaned = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(input)
        .to_string();

    truncate_escaped(cleaned.trim(), MAX_TEXT_LEN)
}

/// Absolute `http`/`https` URLs only; anything else becomes empty
pub fn sanitize_url(input: &str) -> String {
    match Url::parse(input.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            url.to_string()
        }
        _ => String::new(),
    }
}

/// Escape text for interpolation into an HTML template
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Undo the escaping ammonia applies to text nodes
fn unescape_text(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

// Combining diacritical marks used by decomposed names ("e" + U+0301)
fn is_combining_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}'
    )
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}

/// Truncate without leaving half an entity (`&am`) at the end
fn truncate_escaped(input: &str, max: usize) -> String {
    let mut out = truncate_chars(input, max);
    if out.len() < input.len() {
        if let Some(amp) = out.rfind('&') {
            if !out[amp..].contains(';') {
                out.truncate(amp);
            }
        }
    }
    out
}
