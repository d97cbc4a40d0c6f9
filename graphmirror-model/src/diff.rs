//! Three-way property diff.
//!
//! `save` persists only the changed slice of an entity; `reset` merges a
//! fresh server snapshot against local edits. Both start from the same
//! diff of two property maps.

use graphmirror_types::PropMap;

/// The result of diffing `current` against `original`.
///
/// Bucket values are taken from the side that defines the bucket:
/// `added` and `differ` carry the current values, `missing` carries the
/// original ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    /// Properties present only in `current`.
    pub added: PropMap,
    /// Properties present in both with unequal value lists.
    pub differ: PropMap,
    /// Properties present only in `original`.
    pub missing: PropMap,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.differ.is_empty() && self.missing.is_empty()
    }

    /// Every property named by any bucket.
    pub fn property_names(&self) -> Vec<String> {
        self.added
            .keys()
            .chain(self.differ.keys())
            .chain(self.missing.keys())
            .cloned()
            .collect()
    }
}

/// Computes the three-way diff of two property maps.
///
/// Value-list equality is order-sensitive on the serialized
/// (kind, data, lang) triples.
pub fn diff(current: &PropMap, original: &PropMap) -> Delta {
    let mut delta = Delta::default();

    for (property, values) in current {
        match original.get(property) {
            None => {
                delta.added.insert(property.clone(), values.clone());
            }
            Some(original_values) if original_values != values => {
                delta.differ.insert(property.clone(), values.clone());
            }
            Some(_) => {}
        }
    }

    for (property, values) in original {
        if !current.contains_key(property) {
            delta.missing.insert(property.clone(), values.clone());
        }
    }

    delta
}
