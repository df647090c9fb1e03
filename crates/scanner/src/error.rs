use std::time::Duration;

use thiserror::Error;

use stratus_core::Resource;

/// Errors that can occur during provider scan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The cloud API rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// The cloud API did not respond within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// Credentials are missing, invalid, or expired.
    #[error("credential error: {0}")]
    Credentials(String),

    /// The cloud API returned a service-level error.
    #[error("service error: {0}")]
    ServiceError(String),

    /// The scanner was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No scanner is registered under the requested provider name.
    #[error("scanner not registered: {0}")]
    NotRegistered(String),

    /// A provider payload failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The scan's cancellation context fired.
    #[error("scan cancelled")]
    Cancelled,

    /// Enumeration failed partway; `resources` holds what was collected
    /// before `source` stopped the scan. The caller decides whether to
    /// merge the partial results.
    #[error("partial scan ({} resources collected): {source}", .resources.len())]
    Partial {
        /// Resources enumerated before the failure.
        resources: Vec<Resource>,
        /// The failure that interrupted the scan.
        source: Box<ScanError>,
    },
}

impl ScanError {
    /// Returns `true` if the error is transient and the call may succeed on
    /// retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout(_) | Self::Connection(_)
        )
    }

    /// Wrap a failure as a partial outcome carrying already-enumerated
    /// resources.
    #[must_use]
    pub fn partial(resources: Vec<Resource>, source: Self) -> Self {
        Self::Partial {
            resources,
            source: Box::new(source),
        }
    }
}
