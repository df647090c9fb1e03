use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use azure_storage_blob::BlobServiceClient;

use stratus_core::{CloudProvider, Resource, ResourceMetadata};
use stratus_scanner::{ScanError, Scanner};

use crate::auth::build_azure_credential;
use crate::config::AzureScannerConfig;
use crate::error::classify_azure_error;

/// Actor recorded on resources produced by this scanner.
const SCANNER_ACTOR: &str = "azure-scanner";

/// Id prefix for container resources, so direct fetches can route on the
/// id pattern.
pub(crate) const CONTAINER_ID_PREFIX: &str = "azure:container:";

/// Azure scanner enumerating Blob Storage containers.
pub struct AzureScanner {
    config: AzureScannerConfig,
    client: BlobServiceClient,
}

impl std::fmt::Debug for AzureScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureScanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AzureScanner {
    /// Create a new `AzureScanner` by building the Blob Storage client.
    pub async fn new(config: AzureScannerConfig) -> Result<Self, ScanError> {
        let credential = build_azure_credential(&config)
            .await
            .map_err(ScanError::from)?;

        let client = BlobServiceClient::new(&config.endpoint(), Some(credential), None)
            .map_err(|e| ScanError::Configuration(format!("blob client error: {e}")))?;

        Ok(Self { config, client })
    }

    /// List all containers in the account, honoring cancellation between
    /// pages.
    async fn list_containers(
        &self,
        ctx: &CancellationToken,
    ) -> Result<Vec<Resource>, ScanError> {
        let mut resources = Vec::new();
        let mut pager = self.client.list_containers(None).map_err(|e| {
            ScanError::from(classify_azure_error(&e.to_string()))
        })?;

        while let Some(page) = pager.next().await {
            if ctx.is_cancelled() {
                return Err(ScanError::partial(resources, ScanError::Cancelled));
            }
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    return Err(ScanError::partial(
                        resources,
                        classify_azure_error(&e.to_string()).into(),
                    ));
                }
            };
            let body = match page.into_body() {
                Ok(body) => body,
                Err(e) => {
                    return Err(ScanError::partial(
                        resources,
                        ScanError::Serialization(e.to_string()),
                    ));
                }
            };

            for container in body.container_items {
                if let Some(name) = container.name {
                    resources.push(self.container_resource(&name));
                }
            }
        }

        debug!(count = resources.len(), "Azure containers enumerated");
        Ok(resources)
    }

    fn container_resource(&self, name: &str) -> Resource {
        let mut data = serde_json::Map::new();
        data.insert("account".into(), self.config.account_name.clone().into());

        Resource::new(
            format!("{CONTAINER_ID_PREFIX}{}:{name}", self.config.account_name),
            "azure.storage.container",
            CloudProvider::Azure,
            name,
            SCANNER_ACTOR,
        )
        .with_data(data)
        .with_metadata(ResourceMetadata::new(SCANNER_ACTOR).with_region(self.config.location.clone()))
    }
}

impl Scanner for AzureScanner {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "azure"
    }

    #[instrument(skip(self), fields(provider = "azure", account = %self.config.account_name))]
    async fn validate(&self) -> Result<(), ScanError> {
        debug!("validating Azure credentials via list_containers");
        // Driving the first page forces a token acquisition and an
        // authenticated round trip.
        let mut pager = self.client.list_containers(None).map_err(|e| {
            error!(error = %e, "Azure credential check failed");
            ScanError::from(classify_azure_error(&e.to_string()))
        })?;
        if let Some(page) = pager.next().await {
            page.map_err(|e| {
                error!(error = %e, "Azure credential check failed");
                ScanError::from(classify_azure_error(&e.to_string()))
            })?;
        }
        info!("Azure credential check passed");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(provider = "azure", account = %self.config.account_name))]
    async fn scan(&self, ctx: &CancellationToken) -> Result<Vec<Resource>, ScanError> {
        let resources = self.list_containers(ctx).await?;
        info!(count = resources.len(), "Azure scan complete");
        Ok(resources)
    }

    #[instrument(skip(self), fields(provider = "azure"))]
    async fn get_resource(&self, id: &str) -> Result<Resource, ScanError> {
        let Some(qualified) = id.strip_prefix(CONTAINER_ID_PREFIX) else {
            return Err(ScanError::Configuration(format!(
                "cannot infer Azure resource type from id '{id}' \
                 (expected '{CONTAINER_ID_PREFIX}<account>:<container>')"
            )));
        };
        let Some((account, container)) = qualified.split_once(':') else {
            return Err(ScanError::Configuration(format!(
                "malformed container id '{id}'"
            )));
        };
        if account != self.config.account_name {
            return Err(ScanError::Configuration(format!(
                "container id belongs to account '{account}', scanner is configured for '{}'",
                self.config.account_name
            )));
        }

        // The listing is the only API surface this scanner depends on, so
        // direct fetches are answered from it as well.
        let resources = self.list_containers(&CancellationToken::new()).await?;
        resources
            .into_iter()
            .find(|resource| resource.name == container)
            .ok_or_else(|| ScanError::ServiceError(format!("container not found: {container}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_id_prefix_roundtrip() {
        let id = format!("{CONTAINER_ID_PREFIX}prodstore:artifacts");
        let qualified = id.strip_prefix(CONTAINER_ID_PREFIX).unwrap();
        assert_eq!(qualified.split_once(':'), Some(("prodstore", "artifacts")));
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    /// Requires Azurite (or a live account) and Azure CLI login context.
    #[tokio::test]
    async fn validate_and_scan() {
        let account =
            std::env::var("AZURE_STORAGE_ACCOUNT").unwrap_or_else(|_| "devstoreaccount1".into());
        let scanner = AzureScanner::new(AzureScannerConfig::new(account, "eastus"))
            .await
            .expect("client should build");

        scanner.validate().await.expect("credentials should be valid");
        let resources = scanner
            .scan(&CancellationToken::new())
            .await
            .expect("scan should succeed");
        assert!(resources.iter().all(|r| r.validate().is_ok()));
    }
}
