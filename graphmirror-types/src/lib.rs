//! Core type definitions for GraphMirror.
//!
//! This crate defines the fundamental, schema-agnostic types shared by the
//! model and query crates:
//! - The typed value codec (`WireValue` on the wire, `Value` in memory)
//! - The wire entity shape `{"@": id, "<property>": [values...]}`
//! - Well-known vocabulary URIs and id generation
//!
//! Everything schema-specific (which properties an object carries, what its
//! types mean) lives in the remote store's ontology, not here.

mod codec;
mod value;
pub mod vocab;
mod wire;

pub use codec::{classify_literal, format_datetime, parse, serialize};
pub use value::{dedup, Value, WireValue};
pub use vocab::gen_id;
pub use wire::{decode_entity, encode_entity, PropMap, WireEntity};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in codec and wire operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The wire carried a kind tag this codec does not understand.
    /// Distinct from a value simply being absent.
    #[error("unknown value kind: {0}")]
    UnknownKind(String),

    #[error("invalid datetime literal: {0}")]
    InvalidDatetime(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
