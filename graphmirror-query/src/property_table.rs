//! Column-join dialect.
//!
//! One quoted-property table per flattened property, aliased `p0`,
//! `p1`, ... and joined on a synthetic id column; predicates address the
//! first value slot of the kind-specific column (`int[1]`, `dec[1]`,
//! `date[1]`, `str[1]`).

use tracing::debug;

use graphmirror_model::{Entity, Store};
use graphmirror_types::WireValue;

use crate::flatten::flatten;
use crate::term::{datum, day_bounds, lines_of_tokens, sort_values, wildcard_expression};

/// Compiles a pattern into the column-join dialect. `None` when the
/// pattern has no properties, or carries an escape-hatch expression this
/// dialect cannot embed.
pub fn property_table_query(store: &Store, pattern: &Entity) -> Option<String> {
    if wildcard_expression(pattern).is_some() {
        return None;
    }
    let flat = flatten(store, pattern);
    if flat.is_empty() {
        return None;
    }

    let mut tables = Vec::new();
    let mut predicates = Vec::new();
    for (i, (property, values)) in flat.iter().enumerate() {
        tables.push(format!("graph_pt.\"{property}\" AS p{i}"));
        let mut values = values.clone();
        sort_values(&mut values);
        if let Some(term) = column_term(i, &values) {
            predicates.push(format!("( {term} )"));
        }
    }

    let from = tables
        .iter()
        .enumerate()
        .fold(String::new(), |acc, (i, table)| {
            if i == 0 {
                table.clone()
            } else {
                format!("{acc} JOIN {table} ON p{}.id = p{i}.id", i - 1)
            }
        });
    let mut query = format!("SELECT DISTINCT id FROM {from}");
    if !predicates.is_empty() {
        query.push_str(&format!(" WHERE ( {} )", predicates.join(" AND ")));
    }
    debug!(pattern = %pattern.id(), %query, "compiled property-table query");
    Some(query)
}

fn column_term(i: usize, values: &[WireValue]) -> Option<String> {
    let (first, last) = (values.first()?, values.last()?);
    let term = match first {
        WireValue::Integer { .. } => format!(
            "p{i}.int[1] >= {} AND p{i}.int[1] <= {}",
            datum(first),
            datum(last)
        ),
        WireValue::Decimal { .. } => format!(
            "p{i}.dec[1] >= {} AND p{i}.dec[1] <= {}",
            datum(first),
            datum(last)
        ),
        WireValue::Datetime { .. } => {
            let (start, end) = day_bounds(&datum(first), &datum(last))?;
            format!(
                "p{i}.date[1] >= toDateTime({}) AND p{i}.date[1] <= toDateTime({})",
                start.timestamp(),
                end.timestamp()
            )
        }
        WireValue::Boolean { .. } => values
            .iter()
            .filter_map(|value| match value {
                WireValue::Boolean { data } => {
                    Some(format!("p{i}.int[1] = {}", i64::from(*data)))
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
                    format!("p{i}.str[1] LIKE '{line}'")
                })
            })
            .collect::<Vec<_>>()
            .join(" OR "),
        WireValue::Uri { .. } => values
            .iter()
            .filter_map(WireValue::ref_id)
            .map(|id| format!("p{i}.str[1] = '{id}'"))
            .collect::<Vec<_>>()
            .join(" OR "),
    };
    (!term.is_empty()).then_some(term)
}
