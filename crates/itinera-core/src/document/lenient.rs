//! Tolerant field deserializers for model-produced documents.
//!
//! Models routinely emit `null` for text, numbers as strings, and prose in
//! numeric fields. These helpers coerce such values instead of rejecting the
//! whole document. Shapes that cannot be coerced at all (an object where a
//! number belongs, say) still fail.

use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::itinerary::Venue;

/// Text: strings as-is, `null` as empty, numbers and booleans rendered.
pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected text, found {}", kind(&other)))),
    }
}

/// Optional text: blank strings and `null` become `None`.
pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let s = text(d)?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// A list of text items. A lone string becomes a one-item list.
pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect()),
        other => Err(D::Error::custom(format!(
            "expected a list of text, found {}",
            kind(&other)
        ))),
    }
}

/// A monetary amount. Numbers pass through, strings yield their last
/// number (or 0 when they contain none), `null` is 0.
pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("amount out of range")),
        Value::String(s) => Ok(amount_from_text(&s)),
        Value::Null => Ok(0.0),
        other => Err(D::Error::custom(format!(
            "expected an amount, found {}",
            kind(&other)
        ))),
    }
}

/// Optional amount: absent, `null`, or digit-free text is `None`.
pub fn opt_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.chars().any(|c| c.is_ascii_digit()) => Ok(Some(amount_from_text(&s))),
        Value::String(_) | Value::Null => Ok(None),
        other => Err(D::Error::custom(format!(
            "expected an amount, found {}",
            kind(&other)
        ))),
    }
}

/// A non-negative count such as a day number or a head count.
pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    opt_count(d).map(Option::unwrap_or_default)
}

/// Optional count. Fractions are rounded; negatives are rejected.
pub fn opt_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let raw = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.chars().any(|c| c.is_ascii_digit()) => Some(first_number(&s)),
        Value::String(_) | Value::Null => None,
        other => {
            return Err(D::Error::custom(format!(
                "expected a count, found {}",
                kind(&other)
            )));
        }
    };
    match raw {
        Some(v) if v < 0.0 => Err(D::Error::custom(format!("negative count {v}"))),
        Some(v) => Ok(Some(v.round().min(f64::from(u32::MAX)) as u32)),
        None => Ok(None),
    }
}

/// Optional ISO-8601 calendar date (`YYYY-MM-DD`). Unparseable text is `None`.
pub fn opt_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let Some(s) = opt_text(d)? else {
        return Ok(None);
    };
    match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        Ok(date) => Ok(Some(date)),
        Err(e) => {
            tracing::debug!(value = %s, error = %e, "ignoring unparseable date");
            Ok(None)
        }
    }
}

/// A meal or lodging entry in either of its two shapes.
pub fn opt_venue<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Venue>, D::Error> {
    Value::deserialize(d).map(Venue::from_value)
}

/// A list of venues; unrecognized entries are skipped.
pub fn venue_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Venue>, D::Error> {
    match Value::deserialize(d)? {
        Value::Array(items) => Ok(items.into_iter().filter_map(Venue::from_value).collect()),
        other => Ok(Venue::from_value(other).into_iter().collect()),
    }
}

/// The number free text carries, or 0. Prose first: the first number after
/// the prose. Number first: the last number of the arithmetic run it opens,
/// so `1000 + 100 = 1100 yuan` is 1100.
pub(crate) fn amount_from_text(s: &str) -> f64 {
    let s = s.trim();
    if !s.starts_with(|c: char| c.is_ascii_digit()) {
        return first_number(s);
    }
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c.is_whitespace() || "+-*/=.".contains(c)))
        .unwrap_or(s.len());
    numbers(&s[..end]).last().unwrap_or(0.0)
}

fn first_number(s: &str) -> f64 {
    numbers(s).next().unwrap_or(0.0)
}

fn numbers(s: &str) -> impl Iterator<Item = f64> + '_ {
    s.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|part| part.trim_matches('.'))
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse::<f64>().ok())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
