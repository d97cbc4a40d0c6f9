//! Pattern flattening.
//!
//! Collapses a pattern entity and its unpersisted sub-patterns into one
//! property map keyed by dotted paths (`prop.subprop`). References to
//! persisted entities stay as reference values; references to new
//! entities are descended into. Resolution goes through the cache only
//! and never triggers a fetch.

use std::collections::HashSet;

use graphmirror_model::{Entity, Store};
use graphmirror_types::{PropMap, WireEntity};

pub(crate) fn flatten(store: &Store, pattern: &Entity) -> PropMap {
    let mut union = PropMap::new();
    let mut visited = HashSet::new();
    flatten_into(store, &pattern.to_wire(), "", &mut union, &mut visited);
    union
}

fn flatten_into(
    store: &Store,
    wire: &WireEntity,
    prefix: &str,
    union: &mut PropMap,
    visited: &mut HashSet<String>,
) {
    if !visited.insert(wire.id.clone()) {
        return;
    }
    for (property, values) in &wire.props {
        let prefixed = if prefix.is_empty() {
            property.clone()
        } else {
            format!("{prefix}.{property}")
        };
        for value in values {
            let sub_pattern = value
                .ref_id()
                .and_then(|id| store.cached(id))
                .filter(Entity::is_new);
            match sub_pattern {
                Some(sub) => {
                    flatten_into(store, &sub.to_wire(), &prefixed, union, visited);
                }
                None => {
                    union
                        .entry(prefixed.clone())
                        .or_default()
                        .push(value.clone());
                }
            }
        }
    }
}
