use thiserror::Error;

use stratus_scanner::ScanError;

/// Errors specific to Azure scanner operations.
#[derive(Debug, Error)]
pub enum AzureScannerError {
    /// The Azure service returned an error.
    #[error("Azure service error: {0}")]
    ServiceError(String),

    /// The request was throttled by the Azure service.
    #[error("Azure request throttled")]
    Throttled,

    /// A network or connection error occurred communicating with Azure.
    #[error("Azure connection error: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("Azure request timed out")]
    Timeout,

    /// Azure credential construction or resolution failed.
    #[error("credential error: {0}")]
    CredentialError(String),
}

impl From<AzureScannerError> for ScanError {
    fn from(err: AzureScannerError) -> Self {
        match err {
            AzureScannerError::ServiceError(msg) => ScanError::ServiceError(msg),
            AzureScannerError::Throttled => ScanError::RateLimited,
            AzureScannerError::Connection(msg) => ScanError::Connection(msg),
            AzureScannerError::Timeout => ScanError::Timeout(std::time::Duration::from_secs(30)),
            AzureScannerError::CredentialError(msg) => ScanError::Credentials(msg),
        }
    }
}

/// Classify an Azure SDK error string into the appropriate
/// [`AzureScannerError`].
pub fn classify_azure_error(error_str: &str) -> AzureScannerError {
    let lower = error_str.to_lowercase();
    if lower.contains("429") || lower.contains("throttl") || lower.contains("server busy") {
        AzureScannerError::Throttled
    } else if lower.contains("timeout") || lower.contains("timed out") {
        AzureScannerError::Timeout
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("credential")
        || lower.contains("authorization")
        || lower.contains("authentication")
    {
        AzureScannerError::CredentialError(error_str.to_owned())
    } else if lower.contains("connection") || lower.contains("connect") || lower.contains("dns") {
        AzureScannerError::Connection(error_str.to_owned())
    } else {
        AzureScannerError::ServiceError(error_str.to_owned())
    }
}
