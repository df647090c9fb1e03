use thiserror::Error;

/// Errors surfaced by inventory store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A resource, schema, or key with this identity already exists.
    #[error("duplicate id: {0}")]
    Duplicate(String),

    /// The referenced identity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// `parent_id` references an unknown resource.
    #[error("unknown parent resource: {0}")]
    ForeignKey(String),

    /// A concurrent modification was detected; the caller may retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A vector's width does not match the store's configured dimension.
    #[error("vector dimension {actual} does not match store dimension {expected}")]
    DimensionMismatch {
        /// The store-wide dimension.
        expected: usize,
        /// The width that was supplied.
        actual: usize,
    },

    /// Building the audit record inside the write transaction failed.
    #[error("audit append failed: {0}")]
    Audit(#[from] stratus_audit::AuditError),

    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A row or value failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The caller's context was cancelled mid-operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Returns `true` when the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(StoreError::Conflict("row lock".into()).is_retryable());
        assert!(StoreError::Connection("refused".into()).is_retryable());
        assert!(!StoreError::Duplicate("r1".into()).is_retryable());
        assert!(!StoreError::NotFound("r1".into()).is_retryable());
        assert!(!StoreError::Cancelled.is_retryable());
    }

    #[test]
    fn display_carries_identity() {
        assert_eq!(
            StoreError::ForeignKey("vpc-9".into()).to_string(),
            "unknown parent resource: vpc-9"
        );
        assert_eq!(
            StoreError::DimensionMismatch {
                expected: 1536,
                actual: 3
            }
            .to_string(),
            "vector dimension 3 does not match store dimension 1536"
        );
    }
}
