use thiserror::Error;

use stratus_scanner::ScanError;

/// Errors specific to GCP scanner operations.
#[derive(Debug, Error)]
pub enum GcpScannerError {
    /// The GCP service returned an error.
    #[error("GCP service error: {0}")]
    ServiceError(String),

    /// The request was throttled by the GCP service.
    #[error("GCP request throttled")]
    Throttled,

    /// A network or connection error occurred communicating with GCP.
    #[error("GCP connection error: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("GCP request timed out")]
    Timeout,

    /// GCP credential construction or resolution failed.
    #[error("credential error: {0}")]
    CredentialError(String),
}

impl From<GcpScannerError> for ScanError {
    fn from(err: GcpScannerError) -> Self {
        match err {
            GcpScannerError::ServiceError(msg) => ScanError::ServiceError(msg),
            GcpScannerError::Throttled => ScanError::RateLimited,
            GcpScannerError::Connection(msg) => ScanError::Connection(msg),
            GcpScannerError::Timeout => ScanError::Timeout(std::time::Duration::from_secs(30)),
            GcpScannerError::CredentialError(msg) => ScanError::Credentials(msg),
        }
    }
}

/// Classify a GCP SDK error string into the appropriate
/// [`GcpScannerError`].
pub fn classify_gcp_error(error_str: &str) -> GcpScannerError {
    let lower = error_str.to_lowercase();
    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("quota")
        || lower.contains("resource_exhausted")
    {
        GcpScannerError::Throttled
    } else if lower.contains("timeout") || lower.contains("timed out") {
        GcpScannerError::Timeout
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("credential")
        || lower.contains("unauthenticated")
        || lower.contains("permission")
    {
        GcpScannerError::CredentialError(error_str.to_owned())
    } else if lower.contains("connection") || lower.contains("connect") || lower.contains("dns") {
        GcpScannerError::Connection(error_str.to_owned())
    } else {
        GcpScannerError::ServiceError(error_str.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_maps_to_rate_limited() {
        let err: ScanError = classify_gcp_error("RESOURCE_EXHAUSTED: quota exceeded").into();
        assert!(matches!(err, ScanError::RateLimited));
        assert!(err.is_retryable());
    }

    #[test]
    fn permission_is_fatal() {
        let err: ScanError = classify_gcp_error("PERMISSION_DENIED: permission storage.buckets.list").into();
        assert!(matches!(err, ScanError::Credentials(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn default_is_service_error() {
        assert!(matches!(
            classify_gcp_error("bucket not found"),
            GcpScannerError::ServiceError(_)
        ));
    }
}
