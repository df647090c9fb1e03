use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use stratus_core::Resource;
use stratus_scanner::{ScanError, Scanner, with_retries};

use crate::auth::build_sdk_config;
use crate::config::AwsScannerConfig;
use crate::error::classify_sdk_error;
use crate::s3::BUCKET_ARN_PREFIX;
use crate::{ec2, s3};

/// AWS scanner enumerating EC2 instances and S3 buckets.
pub struct AwsScanner {
    config: AwsScannerConfig,
    ec2: aws_sdk_ec2::Client,
    s3: aws_sdk_s3::Client,
}

impl std::fmt::Debug for AwsScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsScanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AwsScanner {
    /// Create a new `AwsScanner` by building the SDK clients.
    pub async fn new(config: AwsScannerConfig) -> Self {
        let sdk_config = build_sdk_config(&config).await;
        let ec2 = aws_sdk_ec2::Client::new(&sdk_config);
        let s3 = aws_sdk_s3::Client::new(&sdk_config);
        Self { config, ec2, s3 }
    }

    /// Create an `AwsScanner` with pre-built clients (for testing).
    pub fn with_clients(
        config: AwsScannerConfig,
        ec2: aws_sdk_ec2::Client,
        s3: aws_sdk_s3::Client,
    ) -> Self {
        Self { config, ec2, s3 }
    }

    /// Fold a per-service result into the running collection. A hard
    /// failure becomes a partial outcome when earlier services already
    /// produced resources.
    fn merge_service_result(
        collected: &mut Vec<Resource>,
        result: Result<Vec<Resource>, ScanError>,
    ) -> Result<(), ScanError> {
        match result {
            Ok(mut resources) => {
                collected.append(&mut resources);
                Ok(())
            }
            Err(ScanError::Partial {
                mut resources,
                source,
            }) => {
                collected.append(&mut resources);
                Err(*source)
            }
            Err(error) => Err(error),
        }
    }
}

impl Scanner for AwsScanner {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "aws"
    }

    #[instrument(skip(self), fields(provider = "aws"))]
    async fn validate(&self) -> Result<(), ScanError> {
        debug!("validating AWS credentials via dry-run describe_instances");
        let result = self.ec2.describe_instances().dry_run(true).send().await;

        match result {
            // A successful response means the API is reachable.
            Ok(_) => {
                info!("AWS credential check passed");
                Ok(())
            }
            Err(e) => {
                let err_str = e.to_string();
                // DryRunOperation means the call would have succeeded.
                if err_str.contains("DryRunOperation") {
                    info!("AWS credential check passed (dry-run)");
                    Ok(())
                } else {
                    error!(error = %err_str, "AWS credential check failed");
                    Err(classify_sdk_error(&err_str).into())
                }
            }
        }
    }

    #[instrument(skip(self, ctx), fields(provider = "aws", region = %self.config.region))]
    async fn scan(&self, ctx: &CancellationToken) -> Result<Vec<Resource>, ScanError> {
        let region = &self.config.region;
        let mut collected = Vec::new();

        let instances = with_retries(&self.config.retry, ctx, || {
            ec2::scan_instances(&self.ec2, region, ctx)
        })
        .await;
        if let Err(error) = Self::merge_service_result(&mut collected, instances) {
            // EC2 produced nothing usable beyond what was already merged;
            // report what we have rather than dropping it.
            if collected.is_empty() {
                return Err(error);
            }
            return Err(ScanError::partial(collected, error));
        }

        let buckets = with_retries(&self.config.retry, ctx, || {
            s3::scan_buckets(&self.s3, region, ctx)
        })
        .await;
        if let Err(error) = Self::merge_service_result(&mut collected, buckets) {
            if collected.is_empty() {
                return Err(error);
            }
            return Err(ScanError::partial(collected, error));
        }

        info!(count = collected.len(), "AWS scan complete");
        Ok(collected)
    }

    #[instrument(skip(self), fields(provider = "aws"))]
    async fn get_resource(&self, id: &str) -> Result<Resource, ScanError> {
        if id.starts_with("i-") {
            ec2::get_instance(&self.ec2, &self.config.region, id).await
        } else if let Some(bucket) = id.strip_prefix(BUCKET_ARN_PREFIX) {
            s3::get_bucket(&self.s3, &self.config.region, bucket).await
        } else {
            Err(ScanError::Configuration(format!(
                "cannot infer AWS resource type from id '{id}' \
                 (expected 'i-*' or '{BUCKET_ARN_PREFIX}*')"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_folds_partial_resources() {
        let mut collected = vec![];
        let partial = ScanError::partial(
            vec![Resource::new(
                "i-1",
                "aws.ec2.instance",
                stratus_core::CloudProvider::Aws,
                "web",
                "aws-scanner",
            )],
            ScanError::RateLimited,
        );
        let err = AwsScanner::merge_service_result(&mut collected, Err(partial)).unwrap_err();
        assert_eq!(collected.len(), 1);
        assert!(matches!(err, ScanError::RateLimited));
    }

    #[test]
    fn merge_appends_on_success() {
        let mut collected = vec![];
        AwsScanner::merge_service_result(&mut collected, Ok(Vec::new())).unwrap();
        assert!(collected.is_empty());
    }
}
