//! Typed property values, in wire and native form.
//!
//! A property value travels as `{"type": <kind>, "data": <raw>, "lang"?: tag}`.
//! The `type` tag discriminates the union, so serde's internally-tagged enum
//! maps onto the wire shape bit-exactly. Native `Value`s are what callers
//! read and write; the codec in this crate converts between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The wire representation of one property value.
///
/// Equality on `WireValue` is the identity used for de-duplication
/// everywhere in the system: the (kind, data, lang) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireValue {
    /// A string, optionally language-tagged.
    String {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },

    /// A reference to another entity, by id.
    Uri { data: String },

    Integer { data: i64 },

    Decimal { data: f64 },

    Boolean { data: bool },

    /// An ISO-8601 datetime, UTC, second precision.
    Datetime { data: String },
}

impl WireValue {
    /// The kind tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::String { .. } => "String",
            WireValue::Uri { .. } => "Uri",
            WireValue::Integer { .. } => "Integer",
            WireValue::Decimal { .. } => "Decimal",
            WireValue::Boolean { .. } => "Boolean",
            WireValue::Datetime { .. } => "Datetime",
        }
    }

    /// Whether this value is a reference.
    pub fn is_ref(&self) -> bool {
        matches!(self, WireValue::Uri { .. })
    }

    /// The referenced id, if this value is a reference.
    pub fn ref_id(&self) -> Option<&str> {
        match self {
            WireValue::Uri { data } => Some(data),
            _ => None,
        }
    }
}

/// A native property value, as handed to and returned from entities.
///
/// References are carried as bare ids; resolving one to a live entity goes
/// through the cache and never triggers a fetch by itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String { text: String, lang: Option<String> },
    Ref(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Datetime(DateTime<Utc>),
}

impl Value {
    /// A plain string value with no language tag.
    pub fn string(text: impl Into<String>) -> Self {
        Value::String {
            text: text.into(),
            lang: None,
        }
    }

    /// A language-tagged string value.
    pub fn lang_string(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Value::String {
            text: text.into(),
            lang: Some(lang.into().to_uppercase()),
        }
    }

    /// A reference to the entity with the given id.
    pub fn reference(id: impl Into<String>) -> Self {
        Value::Ref(id.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String { text, .. } => Some(text),
            _ => None,
        }
    }

    /// The referenced id, if this value is a reference.
    pub fn as_id(&self) -> Option<&str> {
        match self {
            Value::Ref(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Datetime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::string(text)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Decimal(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::Datetime(dt)
    }
}

/// Removes duplicate wire values, preserving first-occurrence order.
///
/// Identity is `WireValue` equality (kind, data, lang), never pointer or
/// native-value identity.
pub fn dedup(values: Vec<WireValue>) -> Vec<WireValue> {
    let mut out: Vec<WireValue> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
