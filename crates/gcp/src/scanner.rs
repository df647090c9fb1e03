use google_cloud_storage::client::StorageControl;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use stratus_core::{CloudProvider, Resource, ResourceMetadata};
use stratus_scanner::{ScanError, Scanner};

use crate::config::GcpScannerConfig;
use crate::error::classify_gcp_error;

/// Actor recorded on resources produced by this scanner.
const SCANNER_ACTOR: &str = "gcp-scanner";

/// Cloud Storage v2 resource-path prefix; bucket ids carry the full path
/// so direct fetches can route on the id pattern.
pub(crate) const BUCKET_PATH_PREFIX: &str = "projects/_/buckets/";

/// GCP scanner enumerating Cloud Storage buckets.
pub struct GcpScanner {
    config: GcpScannerConfig,
    control: StorageControl,
}

impl std::fmt::Debug for GcpScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpScanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GcpScanner {
    /// Create a new `GcpScanner` by building the Cloud Storage control
    /// client.
    pub async fn new(config: GcpScannerConfig) -> Result<Self, ScanError> {
        let credentials = crate::auth::build_gcp_credentials(
            config.credentials_path.as_deref(),
            config.credentials_json.as_deref(),
        )
        .await
        .map_err(ScanError::from)?;

        let mut builder = StorageControl::builder();
        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(creds) = credentials {
            builder = builder.with_credentials(creds);
        }
        let control = builder.build().await.map_err(|e| {
            ScanError::Configuration(format!("Cloud Storage control client error: {e}"))
        })?;

        Ok(Self { config, control })
    }

    fn parent(&self) -> String {
        format!("projects/{}", self.config.project_id)
    }

    fn bucket_resource(&self, bucket: &google_cloud_storage::model::Bucket) -> Resource {
        let display_name = bucket
            .name
            .strip_prefix(BUCKET_PATH_PREFIX)
            .unwrap_or(&bucket.name)
            .to_owned();

        let mut data = serde_json::Map::new();
        data.insert("project".into(), self.config.project_id.clone().into());
        if !bucket.location.is_empty() {
            data.insert("location".into(), bucket.location.clone().into());
        }
        if !bucket.storage_class.is_empty() {
            data.insert("storage_class".into(), bucket.storage_class.clone().into());
        }

        let mut metadata = ResourceMetadata::new(SCANNER_ACTOR);
        if !bucket.location.is_empty() {
            metadata = metadata.with_region(bucket.location.to_lowercase());
        }

        Resource::new(
            bucket.name.clone(),
            "gcp.storage.bucket",
            CloudProvider::Gcp,
            display_name,
            SCANNER_ACTOR,
        )
        .with_data(data)
        .with_metadata(metadata)
    }
}

impl Scanner for GcpScanner {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "gcp"
    }

    #[instrument(skip(self), fields(provider = "gcp", project = %self.config.project_id))]
    async fn validate(&self) -> Result<(), ScanError> {
        debug!("validating GCP credentials via single-page bucket list");
        self.control
            .list_buckets()
            .set_parent(self.parent())
            .set_page_size(1)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "GCP credential check failed");
                ScanError::from(classify_gcp_error(&e.to_string()))
            })?;
        info!("GCP credential check passed");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(provider = "gcp", project = %self.config.project_id))]
    async fn scan(&self, ctx: &CancellationToken) -> Result<Vec<Resource>, ScanError> {
        let mut resources = Vec::new();
        let mut buckets = self
            .control
            .list_buckets()
            .set_parent(self.parent())
            .by_item();

        while let Some(bucket) = buckets.next().await {
            if ctx.is_cancelled() {
                return Err(ScanError::partial(resources, ScanError::Cancelled));
            }
            match bucket {
                Ok(bucket) => resources.push(self.bucket_resource(&bucket)),
                Err(e) => {
                    return Err(ScanError::partial(
                        resources,
                        classify_gcp_error(&e.to_string()).into(),
                    ));
                }
            }
        }

        info!(count = resources.len(), "GCP scan complete");
        Ok(resources)
    }

    #[instrument(skip(self), fields(provider = "gcp"))]
    async fn get_resource(&self, id: &str) -> Result<Resource, ScanError> {
        if !id.starts_with(BUCKET_PATH_PREFIX) {
            return Err(ScanError::Configuration(format!(
                "cannot infer GCP resource type from id '{id}' \
                 (expected '{BUCKET_PATH_PREFIX}*')"
            )));
        }

        let bucket = self
            .control
            .get_bucket()
            .set_name(id)
            .send()
            .await
            .map_err(|e| ScanError::from(classify_gcp_error(&e.to_string())))?;

        Ok(self.bucket_resource(&bucket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_path_prefix_strips_to_display_name() {
        let name = "projects/_/buckets/artifact-store";
        assert_eq!(
            name.strip_prefix(BUCKET_PATH_PREFIX),
            Some("artifact-store")
        );
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    /// Requires fake-gcs-server (or real ADC) reachable via the configured
    /// endpoint.
    #[tokio::test]
    async fn validate_and_scan() {
        let endpoint =
            std::env::var("GCS_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4443".into());
        let scanner = GcpScanner::new(
            GcpScannerConfig::new("test-project").with_endpoint_url(endpoint),
        )
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
