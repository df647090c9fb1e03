use serde::{Deserialize, Serialize};

/// Configuration for the GCP scanner.
#[derive(Clone, Serialize, Deserialize)]
pub struct GcpScannerConfig {
    /// GCP project ID to enumerate.
    pub project_id: String,

    /// Path to a service account JSON key file. When absent (and no inline
    /// JSON is given), Application Default Credentials are used.
    #[serde(default)]
    pub credentials_path: Option<String>,

    /// Inline service account JSON. Takes precedence over
    /// `credentials_path`. Redacted in `Debug`.
    #[serde(default)]
    pub credentials_json: Option<String>,

    /// Optional endpoint URL override for local development
    /// (e.g. `fake-gcs-server`).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for GcpScannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpScannerConfig")
            .field("project_id", &self.project_id)
            .field("credentials_path", &self.credentials_path)
            .field(
                "credentials_json",
                &self.credentials_json.as_ref().map(|_| "[REDACTED]"),
            )
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

impl GcpScannerConfig {
    /// Create a new config for the given project.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            credentials_path: None,
            credentials_json: None,
            endpoint_url: None,
        }
    }

    /// Set the path to a service account JSON key file.
    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<String>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Set inline service account JSON.
    #[must_use]
    pub fn with_credentials_json(mut self, json: impl Into<String>) -> Self {
        self.credentials_json = Some(json.into());
        self
    }

    /// Set the endpoint URL override for local development.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_uses_adc_by_default() {
        let config = GcpScannerConfig::new("inventory-prod");
        assert_eq!(config.project_id, "inventory-prod");
        assert!(config.credentials_path.is_none());
        assert!(config.credentials_json.is_none());
    }

    #[test]
    fn builder_chain() {
        let config = GcpScannerConfig::new("inventory-dev")
            .with_credentials_path("/etc/gcp/sa.json")
            .with_endpoint_url("http://localhost:4443");
        assert_eq!(config.credentials_path.as_deref(), Some("/etc/gcp/sa.json"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4443"));
    }

    #[test]
    fn debug_redacts_inline_credentials() {
        let config =
            GcpScannerConfig::new("p").with_credentials_json(r#"{"private_key": "secret"}"#);
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("private_key"));
    }
}
