//! Compact infix dialect for the full-text filter service.
//!
//! Terms read `'prop'=='value'`, ranges `'prop'==[min,max]`, combined
//! with `||` within a property and `&&` across properties. String
//! constraints compile to `+token*` full-text tokens unless the value
//! already carries its own `+`/`-`/`*` operators, in which case it is
//! passed through untouched.

use tracing::debug;

use graphmirror_model::{Entity, Store};
use graphmirror_types::{vocab, WireValue};

use crate::flatten::flatten;
use crate::term::{datum, day_bounds, lines_of_tokens, sort_values, wildcard_expression};

/// Compiles a pattern into the infix filter dialect. The draft-marker
/// property never constrains a filter. `None` when nothing constrains.
pub fn filter_query(store: &Store, pattern: &Entity) -> Option<String> {
    if let Some(expression) = wildcard_expression(pattern) {
        return Some(expression);
    }
    let flat = flatten(store, pattern);
    let mut predicates = Vec::new();
    for (property, values) in &flat {
        if property == vocab::IS_DRAFT {
            continue;
        }
        let mut values = values.clone();
        sort_values(&mut values);
        if let Some(term) = infix_term(property, &values) {
            predicates.push(format!("( {term} )"));
        }
    }
    let query = (!predicates.is_empty()).then(|| format!("( {} )", predicates.join(" && ")));
    if let Some(query) = &query {
        debug!(pattern = %pattern.id(), %query, "compiled filter query");
    }
    query
}

fn infix_term(property: &str, values: &[WireValue]) -> Option<String> {
    let (first, last) = (values.first()?, values.last()?);
    let term = match first {
        WireValue::Integer { .. } | WireValue::Decimal { .. } => {
            format!("'{property}'==[{},{}]", datum(first), datum(last))
        }
        WireValue::Datetime { .. } => {
            let (start, end) = day_bounds(&datum(first), &datum(last))?;
            format!(
                "'{property}'==[{},{}]",
                start.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                end.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            )
        }
        WireValue::Boolean { .. } => values
            .iter()
            .filter_map(|value| match value {
                WireValue::Boolean { data } => Some(format!("'{property}'=='{data}'")),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" || "),
        WireValue::String { .. } => values
            .iter()
            .filter(|value| !datum(value).is_empty())
            .map(|value| {
                let text = datum(value);
                if text.contains(['+', '-', '*']) {
                    return format!("'{property}'=='{text}'");
                }
                lines_of_tokens(&text)
                    .into_iter()
                    .map(|tokens| {
                        let line = tokens
                            .iter()
                            .map(|token| format!("+{token}*"))
                            .collect::<Vec<_>>()
                            .join(" ");
                        format!("'{property}'=='{line}'")
                    })
                    .collect::<Vec<_>>()
                    .join(" || ")
            })
            .collect::<Vec<_>>()
            .join(" || "),
        WireValue::Uri { .. } => values
            .iter()
            .filter_map(WireValue::ref_id)
            .map(|id| format!("'{property}'=='{id}'"))
            .collect::<Vec<_>>()
            .join(" || "),
    };
    (!term.is_empty()).then_some(term)
}
