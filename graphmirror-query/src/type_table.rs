//! Type-scoped dialect.
//!
//! One SELECT per declared `rdf:type` of the pattern, combined with
//! `UNION ALL`. Property names are mangled into identifier-safe column
//! prefixes; references to unpersisted sub-patterns compile to nested
//! `IN ( <subquery> )` tests.

use std::collections::HashSet;

use tracing::debug;

use graphmirror_model::{Entity, Store};
use graphmirror_types::{vocab, WireValue};

use crate::term::{
    datum, day_bounds, lines_of_tokens, mangle, sort_values, wildcard_expression,
};

/// Compiles a pattern into the type-scoped dialect. `None` when the
/// pattern declares no type, or a sub-pattern contributes nothing.
pub fn type_table_query(store: &Store, pattern: &Entity) -> Option<String> {
    let mut visited = HashSet::new();
    let query = compile(store, pattern, &mut visited);
    if let Some(query) = &query {
        debug!(pattern = %pattern.id(), %query, "compiled type-table query");
    }
    query
}

fn compile(store: &Store, pattern: &Entity, visited: &mut HashSet<String>) -> Option<String> {
    if !visited.insert(pattern.id()) {
        return None;
    }
    if let Some(expression) = wildcard_expression(pattern) {
        return Some(expression);
    }

    let mut predicates = Vec::new();
    for property in pattern.property_names() {
        if property == vocab::TYPE {
            continue;
        }
        let mut values = pattern.get_wire(&property);
        sort_values(&mut values);
        if let Some(term) = scoped_term(store, &mangle(&property), &values, visited) {
            predicates.push(format!("( {term} )"));
        }
    }
    let filter = (!predicates.is_empty()).then(|| format!("( {} )", predicates.join(" AND ")));

    // A sub-pattern that constrains nothing would compile to an
    // unbounded subquery; omit the branch instead.
    if visited.len() > 1 && filter.is_none() {
        return None;
    }

    let selects: Vec<String> = pattern
        .get_wire(vocab::TYPE)
        .iter()
        .filter_map(WireValue::ref_id)
        .map(|type_id| {
            let mut select = format!("SELECT DISTINCT id FROM graph_tt.\"{type_id}\"");
            if let Some(filter) = &filter {
                select.push_str(&format!(" WHERE {filter}"));
            }
            select
        })
        .collect();
    (!selects.is_empty()).then(|| selects.join(" UNION ALL "))
}

fn scoped_term(
    store: &Store,
    prop: &str,
    values: &[WireValue],
    visited: &mut HashSet<String>,
) -> Option<String> {
    let (first, last) = (values.first()?, values.last()?);
    let term = match first {
        WireValue::Integer { .. } => format!(
            "{prop}_int[1] >= {} AND {prop}_int[1] <= {}",
            datum(first),
            datum(last)
        ),
        WireValue::Decimal { .. } => format!(
            "{prop}_dec[1] >= {} AND {prop}_dec[1] <= {}",
            datum(first),
            datum(last)
        ),
        WireValue::Datetime { .. } => {
            let (start, end) = day_bounds(&datum(first), &datum(last))?;
            format!(
                "{prop}_date[1] >= toDateTime({}) AND {prop}_date[1] <= toDateTime({})",
                start.timestamp(),
                end.timestamp()
            )
        }
        WireValue::Boolean { .. } => values
            .iter()
            .filter_map(|value| match value {
                WireValue::Boolean { data } => {
                    Some(format!("{prop}_int[1] = {}", i64::from(*data)))
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" OR "),
        WireValue::String { .. } => values
            .iter()
            .filter(|value| !datum(value).is_empty())
            .flat_map(|value| {
                lines_of_tokens(&datum(value)).into_iter().map(move |tokens| {
                    let line = tokens
                        .iter()
                        .map(|token| format!("%{token}%"))
                        .collect::<Vec<_>>()
                        .join(" ");
                    format!("{prop}_str[1] LIKE '{line}'")
                })
            })
            .collect::<Vec<_>>()
            .join(" OR "),
        WireValue::Uri { .. } => values
            .iter()
            .filter_map(WireValue::ref_id)
            .filter_map(|id| {
                let sub_pattern = store.cached(id).filter(Entity::is_new);
                match sub_pattern {
                    Some(sub) => compile(store, &sub, visited)
                        .map(|sub_query| format!("{prop}_str[1] IN ( {sub_query} )")),
                    None => Some(format!("{prop}_str[1] = '{id}'")),
                }
            })
            .collect::<Vec<_>>()
            .join(" OR "),
    };
    (!term.is_empty()).then_some(term)
}
