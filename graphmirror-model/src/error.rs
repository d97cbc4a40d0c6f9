//! Error types for the model layer.
//!
//! `StoreError` is `Clone` so an in-flight operation's outcome can be
//! shared with every coalesced caller of the same operation.

use thiserror::Error;

use crate::backend::BackendError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in entity lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The remote store rejected or failed the request.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A wire value could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<graphmirror_types::Error> for StoreError {
    fn from(err: graphmirror_types::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
