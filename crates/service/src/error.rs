use thiserror::Error;

use stratus_core::{ValidationError, ValidationReason};
use stratus_scanner::ScanError;
use stratus_store::StoreError;

/// Errors surfaced by the service layer.
///
/// Messages never carry credentials or raw SQL; storage details are
/// flattened to short descriptions before they reach callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The input violates a model invariant.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The referenced resource does not exist.
    #[error("resource not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A resource with this id already exists.
    #[error("resource already exists: {id}")]
    Duplicate {
        /// The colliding id.
        id: String,
    },

    /// `parent_id` references an unknown resource.
    #[error("parent resource not found: {parent_id}")]
    ForeignKey {
        /// The dangling parent reference.
        parent_id: String,
    },

    /// A concurrent modification was detected; the caller may retry.
    #[error("conflicting concurrent modification")]
    Conflict,

    /// A cloud provider failed transiently; a retry or partial outcome
    /// applies.
    #[error("provider transient failure: {0}")]
    ProviderTransient(String),

    /// A cloud provider failed fatally (credentials, availability).
    #[error("provider failure: {0}")]
    ProviderFatal(String),

    /// The caller's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A bug, invariant violation, or unexpected storage failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(id) => Self::Duplicate { id },
            StoreError::NotFound(id) => Self::NotFound { id },
            StoreError::ForeignKey(parent_id) => Self::ForeignKey { parent_id },
            StoreError::Conflict(_) => Self::Conflict,
            StoreError::DimensionMismatch { expected, actual } => Self::Validation(
                ValidationError::new("vector", ValidationReason::DimensionMismatch {
                    expected,
                    actual,
                }),
            ),
            StoreError::Cancelled => Self::Cancelled,
            StoreError::Audit(e) => Self::Internal(format!("audit append failed: {e}")),
            StoreError::Connection(msg) | StoreError::Backend(msg) => {
                Self::Internal(format!("storage failure: {msg}"))
            }
            StoreError::Serialization(msg) => {
                Self::Internal(format!("storage serialization failure: {msg}"))
            }
        }
    }
}

impl From<ScanError> for ServiceError {
    fn from(err: ScanError) -> Self {
        match &err {
            ScanError::Cancelled => Self::Cancelled,
            _ if err.is_retryable() => Self::ProviderTransient(err.to_string()),
            _ => Self::ProviderFatal(err.to_string()),
        }
    }
}
