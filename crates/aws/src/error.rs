use thiserror::Error;

use stratus_scanner::ScanError;

/// Errors specific to AWS scanner operations.
#[derive(Debug, Error)]
pub enum AwsScannerError {
    /// The AWS SDK returned an error from the service.
    #[error("AWS service error: {0}")]
    ServiceError(String),

    /// The request was throttled by the AWS service.
    #[error("AWS request throttled")]
    Throttled,

    /// A network or connection error occurred communicating with AWS.
    #[error("AWS connection error: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("AWS request timed out")]
    Timeout,

    /// AWS credential resolution failed.
    #[error("credential error: {0}")]
    CredentialError(String),
}

impl From<AwsScannerError> for ScanError {
    fn from(err: AwsScannerError) -> Self {
        match err {
            AwsScannerError::ServiceError(msg) => ScanError::ServiceError(msg),
            AwsScannerError::Throttled => ScanError::RateLimited,
            AwsScannerError::Connection(msg) => ScanError::Connection(msg),
            AwsScannerError::Timeout => ScanError::Timeout(std::time::Duration::from_secs(30)),
            AwsScannerError::CredentialError(msg) => ScanError::Credentials(msg),
        }
    }
}

/// Classify an AWS SDK error string into the appropriate [`AwsScannerError`].
///
/// Inspects the error message for common patterns (throttling, timeout,
/// connection, credentials) and maps them to the correct variant.
pub fn classify_sdk_error(error_str: &str) -> AwsScannerError {
    let lower = error_str.to_lowercase();
    if lower.contains("throttl") || lower.contains("rate exceed") || lower.contains("too many") {
        AwsScannerError::Throttled
    } else if lower.contains("timeout") || lower.contains("timed out") {
        AwsScannerError::Timeout
    } else if lower.contains("credential")
        || lower.contains("access denied")
        || lower.contains("unauthorized")
        || lower.contains("expired token")
    {
        AwsScannerError::CredentialError(error_str.to_owned())
    } else if lower.contains("connection")
        || lower.contains("connect")
        || lower.contains("dns")
        || lower.contains("network")
    {
        AwsScannerError::Connection(error_str.to_owned())
    } else {
        AwsScannerError::ServiceError(error_str.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_maps_to_rate_limited() {
        let err: ScanError = AwsScannerError::Throttled.into();
        assert!(matches!(err, ScanError::RateLimited));
        assert!(err.is_retryable());
    }

    #[test]
    fn timeout_maps_to_timeout() {
        let err: ScanError = AwsScannerError::Timeout.into();
        assert!(matches!(err, ScanError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn credentials_map_to_credentials() {
        let err: ScanError = AwsScannerError::CredentialError("no credentials".into()).into();
        assert!(matches!(err, ScanError::Credentials(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn classify_throttled() {
        assert!(matches!(
            classify_sdk_error("Throttling: Rate exceeded"),
            AwsScannerError::Throttled
        ));
    }

    #[test]
    fn classify_timeout() {
        assert!(matches!(
            classify_sdk_error("dispatch failure: request timed out"),
            AwsScannerError::Timeout
        ));
    }

    #[test]
    fn classify_credentials() {
        assert!(matches!(
            classify_sdk_error("AccessDenied: access denied for operation"),
            AwsScannerError::CredentialError(_)
        ));
    }

    #[test]
    fn classify_connection() {
        assert!(matches!(
            classify_sdk_error("connection refused by peer"),
            AwsScannerError::Connection(_)
        ));
    }

    #[test]
    fn classify_default_service_error() {
        assert!(matches!(
            classify_sdk_error("InvalidInstanceID.NotFound"),
            AwsScannerError::ServiceError(_)
        ));
    }
}
