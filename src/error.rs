//! Error types.
//!
//! [`GraphError`] aborts a build. [`DecodeError`] never does: it only reaches
//! the subscribers of the buffer source that failed.

use thiserror::Error;

/// A fatal error raised while building a node graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A value shorthand was neither a number nor a definition object.
    #[error("invalid value type in unit generator definition: expected a number or an object, found {found}")]
    InvalidValueType { found: &'static str },

    /// No generator type could be resolved for a definition.
    #[error("unit generator definition lacks a 'type' property; can't initialize the graph")]
    MissingType,

    /// The type name is not present in the type registry.
    #[error("unknown unit generator type '{name}'")]
    UnknownGeneratorType { name: String },

    /// A rate that is neither a mnemonic nor a canonical rate name.
    #[error("unknown rate '{rate}'")]
    UnknownRate { rate: String },

    /// A definition field had the wrong shape (e.g. `inputs` was not an object).
    #[error("malformed unit generator definition: {0}")]
    InvalidDefinition(#[from] serde_json::Error),

    /// A buffer reference that is not an id, a sample array or a buffer definition.
    #[error("invalid buffer definition: {reason}")]
    InvalidBufferDef { reason: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, GraphError>;

/// Why a buffer could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vorbis error: {0}")]
    Vorbis(#[from] lewton::VorbisError),

    /// The configured decoder cannot handle this source.
    #[error("no decoder available for '{src}'")]
    Unsupported { src: String },

    /// The background decoder's request queue was full.
    #[error("decode queue is full, dropped request for '{src}'")]
    QueueFull { src: String },

    #[error("{0}")]
    Failed(String),
}

/// Short name of a JSON value's kind, for error messages.
pub(crate) fn kind_of(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
