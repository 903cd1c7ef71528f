//! Error types for the OData client core.
//!
//! # Design
//! One enum covers metadata loading, payload decoding and transport. Decode
//! variants carry the entity type and property being decoded plus the raw
//! fragment where there is one, so a failed `read_*` call can be diagnosed
//! without re-fetching. A failing decode never yields a partial result.

use thiserror::Error;

/// Errors returned by metadata parsing, payload decoding and `ODataClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ODataError {
    /// The `$metadata` document is not well formed or references an
    /// undeclared type, association or role.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// The model has no entity set with this name.
    #[error("unknown entity set '{0}'")]
    UnknownEntitySet(String),

    /// The feed or entry document does not have the expected shape.
    #[error("malformed payload for {context}: {reason}")]
    MalformedPayload { context: String, reason: String },

    /// A non-nullable property is absent and the decoder is strict.
    #[error("missing non-nullable property '{property}' on {entity_type}")]
    MissingProperty {
        entity_type: String,
        property: String,
    },

    /// The raw text could not be parsed into the declared EDM type.
    #[error("invalid value for {entity_type}.{property} ({expected}): {raw}")]
    InvalidValue {
        entity_type: String,
        property: String,
        expected: String,
        raw: String,
    },

    /// The raw JSON value has the wrong shape for the declared EDM type.
    #[error("type mismatch for {entity_type}.{property}: expected {expected}, got {raw}")]
    TypeMismatch {
        entity_type: String,
        property: String,
        expected: String,
        raw: String,
    },

    /// Inline expansion revisited an entity type already being expanded.
    #[error("expansion cycle: {path}")]
    ExpansionCycle { path: String },

    /// The server answered with a status in 400..=599.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (DNS, refused, timeout).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ODataError {
    pub(crate) fn payload(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ODataError::MalformedPayload {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status code, if this error came from a 4xx/5xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ODataError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
