//! Error types for the sle-proto crate.

use thiserror::Error;

/// Errors that can occur while decoding or interpreting proxy data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// Failed to decode a message or document.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field held a value outside its enumeration.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A profile's fields contradict its provider or return type.
    #[error("inconsistent profile: {0}")]
    InconsistentProfile(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ProtoError {
    /// Shorthand for [`ProtoError::InvalidValue`].
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }
}

impl From<serde_json::Error> for ProtoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decoding(e.to_string())
    }
}
