//! Conversion between native values and their wire representation.
//!
//! `serialize` and `parse` are total per known kind and inverse of each
//! other, with one documented caveat: the wire keeps the integer/decimal
//! distinction only because the kind tag travels with the datum; a literal
//! string classified at the text boundary follows the precedence rules of
//! [`classify_literal`] instead.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::value::{Value, WireValue};
use crate::{Error, Result};

/// Strict URI-prefix grammar: `prefix:local`, lowercase prefix.
static RE_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*:[a-zA-Z0-9_-]*$").unwrap());

/// ISO-8601 UTC datetime, optional milliseconds.
static RE_DATETIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{3})?Z$").unwrap());

/// `text^^lang` convention for language-tagged literals.
static RE_LANG_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^(.*)\^\^([a-z]{2})$").unwrap());

/// Whole-number decimal spelled with a trailing `.0` (or `,0`).
static RE_ROUND_DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.,]0$").unwrap());

/// Formats a datetime the way it travels on the wire: UTC, second
/// precision, trailing fraction truncated.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serializes a native value into its wire form.
///
/// Returns `None` for values the wire cannot carry (currently: empty
/// strings); callers filter these out rather than storing holes.
pub fn serialize(value: &Value) -> Option<WireValue> {
    match value {
        Value::Integer(n) => Some(WireValue::Integer { data: *n }),
        Value::Decimal(n) => Some(WireValue::Decimal { data: *n }),
        Value::Boolean(b) => Some(WireValue::Boolean { data: *b }),
        Value::Datetime(dt) => Some(WireValue::Datetime {
            data: format_datetime(*dt),
        }),
        Value::Ref(id) => Some(WireValue::Uri { data: id.clone() }),
        Value::String { text, lang } => match lang {
            Some(lang) => {
                if text.is_empty() {
                    None
                } else {
                    Some(WireValue::String {
                        data: text.clone(),
                        lang: Some(lang.to_uppercase()),
                    })
                }
            }
            None => classify_literal(text),
        },
    }
}

/// Classifies an untyped literal into a wire value.
///
/// This is the one place pattern-based kind inference is allowed: the
/// literal boundary, where text truly arrives untyped (user input, script
/// parameters). Precedence is fixed and tested:
/// reference > datetime > language-string > round decimal > plain string.
///
/// Returns `None` for empty input.
pub fn classify_literal(text: &str) -> Option<WireValue> {
    if RE_URI.is_match(text) {
        return Some(WireValue::Uri {
            data: text.to_string(),
        });
    }
    if RE_DATETIME.is_match(text) {
        return Some(WireValue::Datetime {
            data: text.to_string(),
        });
    }
    if let Some(caps) = RE_LANG_STRING.captures(text) {
        return Some(WireValue::String {
            data: caps[1].to_string(),
            lang: Some(caps[2].to_uppercase()),
        });
    }
    if RE_ROUND_DECIMAL.is_match(text) {
        let normalized = text.replace(',', ".");
        return Some(WireValue::Decimal {
            // The grammar guarantees a parseable decimal.
            data: normalized.parse().unwrap_or_default(),
        });
    }
    if text.is_empty() {
        return None;
    }
    Some(WireValue::String {
        data: text.to_string(),
        lang: None,
    })
}

/// Parses a wire value back into its native form.
///
/// The inverse of [`serialize`]. A `lang` of `"NONE"` (legacy spelling for
/// "no language") normalizes to absent. Malformed datetime data is an
/// error, reported distinctly rather than silently coerced.
pub fn parse(wire: &WireValue) -> Result<Value> {
    match wire {
        WireValue::String { data, lang } => Ok(Value::String {
            text: data.clone(),
            lang: lang
                .as_deref()
                .filter(|l| !l.eq_ignore_ascii_case("NONE"))
                .map(|l| l.to_uppercase()),
        }),
        WireValue::Uri { data } => Ok(Value::Ref(data.clone())),
        WireValue::Integer { data } => Ok(Value::Integer(*data)),
        WireValue::Decimal { data } => Ok(Value::Decimal(*data)),
        WireValue::Boolean { data } => Ok(Value::Boolean(*data)),
        WireValue::Datetime { data } => {
            let dt = DateTime::parse_from_rfc3339(data)
                .map_err(|_| Error::InvalidDatetime(data.clone()))?;
            Ok(Value::Datetime(dt.with_timezone(&Utc)))
        }
    }
}
