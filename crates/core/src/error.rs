use thiserror::Error;

/// Machine-readable reason code attached to a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// A required value is empty or missing.
    Empty,
    /// The provider tag is not in the canonical set.
    UnknownProvider,
    /// A vector's length does not match the configured dimension.
    DimensionMismatch {
        /// The store-wide dimension.
        expected: usize,
        /// The length that was supplied.
        actual: usize,
    },
    /// `modified_at` precedes `created_at`.
    TimestampOrder,
    /// A numeric bound was violated.
    OutOfRange,
    /// A filter or schema key is not recognized.
    UnknownField,
    /// A value has the wrong JSON type.
    WrongType {
        /// The JSON type tag the schema expects.
        expected: &'static str,
    },
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("must not be empty"),
            Self::UnknownProvider => f.write_str("unknown provider"),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "vector dimension {actual} does not match {expected}")
            }
            Self::TimestampOrder => f.write_str("modified_at precedes created_at"),
            Self::OutOfRange => f.write_str("value out of range"),
            Self::UnknownField => f.write_str("unrecognized field"),
            Self::WrongType { expected } => write!(f, "expected {expected}"),
        }
    }
}

/// A resource or query failed invariant validation.
///
/// Carries the dotted field path and a machine-readable reason so callers
/// can surface structured errors without parsing text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `metadata.created_by`).
    pub field: String,
    /// Why the field was rejected.
    pub reason: ValidationReason,
}

impl ValidationError {
    /// Create a validation error for the given field path.
    pub fn new(field: impl Into<String>, reason: ValidationReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }

    /// Shorthand for the common empty-field case.
    pub fn empty(field: impl Into<String>) -> Self {
        Self::new(field, ValidationReason::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_field_and_reason() {
        let err = ValidationError::empty("metadata.created_by");
        assert_eq!(err.to_string(), "metadata.created_by: must not be empty");
    }

    #[test]
    fn dimension_mismatch_display() {
        let err = ValidationError::new(
            "vector",
            ValidationReason::DimensionMismatch {
                expected: 1536,
                actual: 3,
            },
        );
        assert_eq!(err.to_string(), "vector: vector dimension 3 does not match 1536");
    }
}
