use thiserror::Error;

/// Errors raised while building or verifying audit records.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Canonical serialization of the record tuple failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The configured signer failed to produce a signature.
    #[error("signing error: {0}")]
    Signing(String),

    /// A signing or verifying key could not be decoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}
