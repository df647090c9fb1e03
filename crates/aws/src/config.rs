use serde::{Deserialize, Serialize};

use stratus_scanner::RetryPolicy;

/// Configuration for the AWS scanner.
///
/// Contains the region to enumerate, an optional STS assume-role ARN for
/// cross-account access, and an endpoint URL override for local development
/// (e.g. `LocalStack`).
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsScannerConfig {
    /// AWS region (e.g. `"us-east-1"`).
    pub region: String,

    /// Optional IAM role ARN to assume via STS for cross-account access.
    #[serde(default)]
    pub role_arn: Option<String>,

    /// Optional endpoint URL override for local development (e.g. `LocalStack`).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Optional STS session name (defaults to `"stratus-aws-scanner"`).
    #[serde(default)]
    pub session_name: Option<String>,

    /// Optional external ID for cross-account trust policies.
    #[serde(default)]
    pub external_id: Option<String>,

    /// Retry policy for transient API failures during a scan.
    #[serde(skip)]
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for AwsScannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsScannerConfig")
            .field("region", &self.region)
            .field("role_arn", &self.role_arn.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint_url", &self.endpoint_url)
            .field("session_name", &self.session_name)
            .field("external_id", &self.external_id)
            .field("retry", &self.retry)
            .finish()
    }
}

impl AwsScannerConfig {
    /// Create a new `AwsScannerConfig` with the given region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            role_arn: None,
            endpoint_url: None,
            session_name: None,
            external_id: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Set an IAM role ARN to assume via STS.
    #[must_use]
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    /// Set an endpoint URL override for local development.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Set the STS session name for assume-role.
    #[must_use]
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    /// Set the external ID for cross-account trust policies.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for AwsScannerConfig {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}
