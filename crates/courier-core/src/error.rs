//! # Validation Errors
//!
//! Construction-time failures for the core newtypes. Each variant names the
//! offending field or identifier kind so callers can surface it verbatim.

use thiserror::Error;

/// A value was rejected by a validated constructor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier was empty or only whitespace.
    #[error("{kind} must not be empty")]
    EmptyIdentifier { kind: &'static str },

    /// Identifier exceeded the maximum length.
    #[error("{kind} exceeds {max} characters (got {len})")]
    IdentifierTooLong {
        kind: &'static str,
        max: usize,
        len: usize,
    },

    /// Identifier contained whitespace or control characters.
    #[error("{kind} contains invalid character {found:?}")]
    InvalidCharacter { kind: &'static str, found: char },

    /// Monetary field was negative.
    #[error("{field} must not be negative (got {value})")]
    NegativeAmount { field: &'static str, value: i64 },

    /// Timestamp could not be parsed or was out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A free-form field failed a business rule.
    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Field`].
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}
