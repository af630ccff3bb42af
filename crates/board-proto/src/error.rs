//! Error types for the shared protocol values.

use thiserror::Error;

/// Errors that can occur while constructing or parsing protocol values.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// A typed reference string did not have the `reference._type` form.
    #[error("invalid typed reference: {0}")]
    InvalidTypedReference(String),

    /// An identifier string was not a valid UUID.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
