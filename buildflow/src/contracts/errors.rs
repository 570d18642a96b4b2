//! Validation result and field error types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One structural problem found in a raw stage output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path to the offending field (`$` for the document root).
    pub path: String,
    /// What the contract expected.
    pub expected: String,
    /// What was found.
    pub received: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            received: received.into(),
        }
    }

    /// Serialize the error for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "path": self.path,
            "expected": self.expected,
            "received": self.received,
        })
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field '{}': expected {}, received {}",
            self.path, self.expected, self.received
        )
    }
}

impl std::error::Error for FieldError {}

/// Outcome of checking a raw value against a contract.
///
/// Either the typed value or the ordered list of every field error found,
/// never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    /// The value satisfied the contract.
    Valid(T),
    /// The value violated the contract.
    Invalid(Vec<FieldError>),
}

impl<T> Validation<T> {
    /// Returns true for [`Validation::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Returns the field errors, empty when valid.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        match self {
            Self::Valid(_) => &[],
            Self::Invalid(errors) => errors,
        }
    }

    /// Maps the valid value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Validation<U> {
        match self {
            Self::Valid(value) => Validation::Valid(f(value)),
            Self::Invalid(errors) => Validation::Invalid(errors),
        }
    }

    /// Converts into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the field errors when the value was invalid.
    pub fn into_result(self) -> Result<T, Vec<FieldError>> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Invalid(errors) => Err(errors),
        }
    }
}

/// Renders field errors as one line each.
#[must_use]
pub fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_display() {
        let err = FieldError::new("complexityScore", "integer between 1 and 10", "11");
        assert_eq!(
            err.to_string(),
            "Field 'complexityScore': expected integer between 1 and 10, received 11"
        );
    }

    #[test]
    fn test_validation_accessors() {
        let ok: Validation<u8> = Validation::Valid(3);
        assert!(ok.is_valid());
        assert!(ok.errors().is_empty());
        assert_eq!(ok.map(|v| v * 2).into_result(), Ok(6));

        let bad: Validation<u8> = Validation::Invalid(vec![FieldError::new("a", "string", "missing")]);
        assert!(!bad.is_valid());
        assert_eq!(bad.errors().len(), 1);
    }

    #[test]
    fn test_summarize_joins_errors() {
        let errors = vec![
            FieldError::new("a", "string", "missing"),
            FieldError::new("b", "array", "number"),
        ];
        let summary = summarize(&errors);
        assert!(summary.contains("Field 'a'"));
        assert!(summary.contains("; Field 'b'"));
    }
}
