//! Value classification shared by all dialects.

use chrono::{DateTime, Utc};

use graphmirror_model::Entity;
use graphmirror_types::{vocab, WireValue};

/// Sorts a value list in place: numerically for numbers, by raw datum
/// otherwise (ISO datetimes sort chronologically that way).
pub(crate) fn sort_values(values: &mut [WireValue]) {
    values.sort_by(|a, b| match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => datum(a).cmp(&datum(b)),
    });
}

fn numeric(value: &WireValue) -> Option<f64> {
    match value {
        WireValue::Integer { data } => Some(*data as f64),
        WireValue::Decimal { data } => Some(*data),
        _ => None,
    }
}

/// The raw datum as text, for ordering and rendering.
pub(crate) fn datum(value: &WireValue) -> String {
    match value {
        WireValue::String { data, .. } => data.clone(),
        WireValue::Uri { data } => data.clone(),
        WireValue::Datetime { data } => data.clone(),
        WireValue::Integer { data } => data.to_string(),
        WireValue::Decimal { data } => data.to_string(),
        WireValue::Boolean { data } => data.to_string(),
    }
}

/// Widens a datetime interval to whole calendar days: start floored to
/// 00:00:00, end ceiled to 23:59:59.999, both UTC. `None` on
/// unparseable input.
pub(crate) fn day_bounds(start: &str, end: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = DateTime::parse_from_rfc3339(start).ok()?.with_timezone(&Utc);
    let end = DateTime::parse_from_rfc3339(end).ok()?.with_timezone(&Utc);
    let start = start.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
    let end = end.date_naive().and_hms_milli_opt(23, 59, 59, 999)?.and_utc();
    Some((start, end))
}

/// Splits a string constraint into lines of search tokens. Token
/// separators are whitespace, hyphen and asterisk runs; empty lines and
/// tokens are dropped.
pub(crate) fn lines_of_tokens(text: &str) -> Vec<Vec<String>> {
    text.trim()
        .split('\n')
        .map(|line| {
            line.trim()
                .split(|c: char| c.is_whitespace() || c == '-' || c == '*')
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect::<Vec<String>>()
        })
        .filter(|tokens| !tokens.is_empty())
        .collect()
}

/// The escape-hatch expression, if the pattern carries one: the first
/// value of the reserved wildcard property, when it already looks like a
/// complete filter (`==` past the first character).
pub(crate) fn wildcard_expression(pattern: &Entity) -> Option<String> {
    let first = pattern.get_wire(vocab::WILDCARD).into_iter().next()?;
    let data = match first {
        WireValue::String { data, .. } => data,
        WireValue::Uri { data } => data,
        _ => return None,
    };
    if data.find("==").is_some_and(|pos| pos > 0) {
        Some(data)
    } else {
        None
    }
}

/// `[^A-Za-z0-9] → _`, the identifier mangling used by the type-table
/// dialect.
pub(crate) fn mangle(property: &str) -> String {
    property
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
