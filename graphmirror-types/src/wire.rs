//! The wire entity shape.
//!
//! An entity travels as a flat JSON object: the reserved `"@"` key carries
//! the id, every other key is a property URI mapping to an ordered list of
//! typed values. `#[serde(flatten)]` keeps the property map open-world.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::WireValue;
use crate::{Error, Result};

/// Property URI → ordered list of wire values.
///
/// Invariant maintained by the model layer: no key maps to an empty list.
/// A property with no values is absent, not present-and-empty.
pub type PropMap = BTreeMap<String, Vec<WireValue>>;

/// The stable, bit-exact wire shape of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireEntity {
    #[serde(rename = "@")]
    pub id: String,

    #[serde(flatten)]
    pub props: PropMap,
}

impl WireEntity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            props: PropMap::new(),
        }
    }

    /// Sets a property, dropping it instead when `values` is empty.
    pub fn set(mut self, property: impl Into<String>, values: Vec<WireValue>) -> Self {
        if !values.is_empty() {
            self.props.insert(property.into(), values);
        }
        self
    }

    pub fn has(&self, property: &str) -> bool {
        self.props.get(property).is_some_and(|v| !v.is_empty())
    }
}

/// Decodes a wire entity from JSON text.
///
/// A value carrying a kind tag outside the known set is reported as
/// [`Error::UnknownKind`], distinct from other malformed input.
pub fn decode_entity(json: &str) -> Result<WireEntity> {
    serde_json::from_str(json).map_err(|err| {
        let message = err.to_string();
        if message.contains("unknown variant") {
            Error::UnknownKind(message)
        } else {
            Error::Serialization(err)
        }
    })
}

/// Encodes a wire entity to its JSON text form.
pub fn encode_entity(entity: &WireEntity) -> Result<String> {
    Ok(serde_json::to_string(entity)?)
}
