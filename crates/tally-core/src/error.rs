//! Error types for tally-core

use thiserror::Error;

/// Result type for coercion operations
pub type CoerceResult<T> = std::result::Result<T, CoercionError>;

/// Errors that can occur while coercing a value to a declared type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    /// The declared type tag is not one of the supported tags
    #[error("Unsupported variable type: {0}")]
    UnsupportedType(String),

    /// Value cannot be interpreted as a number
    #[error("could not convert {found} to number: '{value}'")]
    InvalidNumber { value: String, found: &'static str },

    /// Text did not match any known date/time format
    #[error("Unknown datetime format: '{0}'")]
    InvalidDateTime(String),

    /// Text contained no recognizable currency amount
    #[error("Invalid currency format: '{0}'")]
    InvalidCurrency(String),
}

impl CoercionError {
    /// Whether this error is about the declared type tag rather than the value
    pub fn is_unsupported_type(&self) -> bool {
        matches!(self, CoercionError::UnsupportedType(_))
    }
}
