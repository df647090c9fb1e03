use std::sync::Arc;

use azure_core::credentials::{Secret, TokenCredential};
use tracing::{debug, info};

use crate::config::AzureScannerConfig;
use crate::error::AzureScannerError;

/// Build an Azure credential from the given [`AzureScannerConfig`].
///
/// If `tenant_id`, `client_id`, and `client_credential` are all present,
/// uses `ClientSecretCredential` for service-principal authentication.
/// Otherwise falls back to `AzureCliCredential`, which uses the Azure CLI
/// login context (suitable for development and CI environments).
#[allow(clippy::unused_async)]
pub async fn build_azure_credential(
    config: &AzureScannerConfig,
) -> Result<Arc<dyn TokenCredential>, AzureScannerError> {
    if let (Some(tenant_id), Some(client_id), Some(client_cred)) = (
        &config.tenant_id,
        &config.client_id,
        &config.client_credential,
    ) {
        info!("using service-principal credentials for Azure");
        debug!(tenant_id = %tenant_id, "building ClientSecretCredential");

        let credential = azure_identity::ClientSecretCredential::new(
            tenant_id,
            client_id.clone(),
            Secret::new(client_cred.clone()),
            None,
        )
        .map_err(|e| AzureScannerError::CredentialError(e.to_string()))?;

        Ok(credential)
    } else {
        info!("using AzureCliCredential for Azure (dev/CI fallback)");
        let credential = azure_identity::AzureCliCredential::new(None)
            .map_err(|e| AzureScannerError::CredentialError(e.to_string()))?;

        Ok(credential)
    }
}
