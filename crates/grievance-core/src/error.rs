//! # Error Hierarchy
//!
//! Validation errors for domain inputs, built with `thiserror`.
//! Each variant names the offending field so API and CLI surfaces can
//! report it without inspecting logs.

use thiserror::Error;

/// Validation errors for domain primitives and request data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was absent or contained only whitespace.
    #[error("{field} must not be empty")]
    Empty {
        /// The field name as exposed to callers.
        field: &'static str,
    },

    /// A value could not be parsed into its domain type.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// The field name as exposed to callers.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A date range whose start falls after its end.
    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange {
        /// The range start (ISO 8601 date).
        from: String,
        /// The range end (ISO 8601 date).
        to: String,
    },
}

impl ValidationError {
    /// Reject blank text: `None`, empty, or whitespace-only.
    pub fn require_text<'a>(
        field: &'static str,
        value: Option<&'a str>,
    ) -> Result<&'a str, ValidationError> {
        match value.map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(ValidationError::Empty { field }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_rejects_whitespace() {
        assert_eq!(
            ValidationError::require_text("outcome", Some("   \n")),
            Err(ValidationError::Empty { field: "outcome" })
        );
        assert!(ValidationError::require_text("outcome", None).is_err());
    }

    #[test]
    fn require_text_returns_trimmed_value() {
        assert_eq!(
            ValidationError::require_text("outcome", Some("  denied  ")),
            Ok("denied")
        );
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = ValidationError::Empty { field: "withdrawal_details" };
        assert_eq!(err.to_string(), "withdrawal_details must not be empty");

        let err = ValidationError::InvalidDateRange {
            from: "2024-03-01".into(),
            to: "2024-02-01".into(),
        };
        assert!(err.to_string().contains("2024-03-01"));
    }
}
