use serde::{Deserialize, Serialize};

/// Configuration for the Azure scanner.
///
/// Contains the storage account to enumerate, the service-principal
/// credentials, and an optional endpoint URL override for local development
/// (e.g. `Azurite`).
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureScannerConfig {
    /// Azure Storage account name.
    pub account_name: String,

    /// Azure region / location (e.g. `"eastus"`).
    pub location: String,

    /// Azure AD tenant ID.
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Azure AD application (client) ID.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Azure AD client credential (service principal). Redacted in `Debug`.
    #[serde(default)]
    pub client_credential: Option<String>,

    /// Optional endpoint URL override for local development (e.g. `Azurite`).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for AzureScannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureScannerConfig")
            .field("account_name", &self.account_name)
            .field("location", &self.location)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id.as_ref().map(|_| "[REDACTED]"))
            .field(
                "client_credential",
                &self.client_credential.as_ref().map(|_| "[REDACTED]"),
            )
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

impl AzureScannerConfig {
    /// Create a new config for the given storage account and location.
    pub fn new(account_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            location: location.into(),
            tenant_id: None,
            client_id: None,
            client_credential: None,
            endpoint_url: None,
        }
    }

    /// Set the Azure AD tenant ID.
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the Azure AD application (client) ID.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the Azure AD client credential.
    #[must_use]
    pub fn with_client_credential(mut self, client_credential: impl Into<String>) -> Self {
        self.client_credential = Some(client_credential.into());
        self
    }

    /// Set the endpoint URL override for local development.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// The blob endpoint to connect to.
    pub(crate) fn endpoint(&self) -> String {
        self.endpoint_url.clone().unwrap_or_else(|| {
            format!("https://{}.blob.core.windows.net", self.account_name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_sets_identity() {
        let config = AzureScannerConfig::new("prodstore", "westeurope");
        assert_eq!(config.account_name, "prodstore");
        assert_eq!(config.location, "westeurope");
        assert_eq!(config.endpoint(), "https://prodstore.blob.core.windows.net");
    }

    #[test]
    fn endpoint_override_wins() {
        let config = AzureScannerConfig::new("devstore", "eastus")
            .with_endpoint_url("http://127.0.0.1:10000/devstore");
        assert_eq!(config.endpoint(), "http://127.0.0.1:10000/devstore");
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = AzureScannerConfig::new("store", "eastus")
            .with_client_id("app-id-123")
            .with_client_credential("super-private");
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("app-id-123"));
        assert!(!debug.contains("super-private"));
    }

    #[test]
    fn serde_roundtrip() {
        let config = AzureScannerConfig::new("store", "northeurope").with_tenant_id("tid-1");
        let json = serde_json::to_string(&config).unwrap();
        let back: AzureScannerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.account_name, "store");
        assert_eq!(back.tenant_id.as_deref(), Some("tid-1"));
    }
}
