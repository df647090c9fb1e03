use tokio_util::sync::CancellationToken;
use tracing::debug;

use stratus_core::{CloudProvider, Resource, ResourceMetadata};
use stratus_scanner::ScanError;

use crate::ec2::SCANNER_ACTOR;
use crate::error::classify_sdk_error;

/// Id prefix for bucket resources; bucket ids are the full ARN so that
/// direct fetches can route on the id pattern.
pub(crate) const BUCKET_ARN_PREFIX: &str = "arn:aws:s3:::";

/// Enumerate all S3 buckets into canonical resources.
pub(crate) async fn scan_buckets(
    client: &aws_sdk_s3::Client,
    region: &str,
    ctx: &CancellationToken,
) -> Result<Vec<Resource>, ScanError> {
    if ctx.is_cancelled() {
        return Err(ScanError::Cancelled);
    }

    let result = client
        .list_buckets()
        .send()
        .await
        .map_err(|e| ScanError::from(classify_sdk_error(&e.to_string())))?;

    let resources: Vec<Resource> = result
        .buckets()
        .iter()
        .filter_map(|bucket| map_bucket(bucket, region))
        .collect();

    debug!(count = resources.len(), "S3 buckets enumerated");
    Ok(resources)
}

/// Fetch a single bucket by name, verifying it exists via `head_bucket`.
pub(crate) async fn get_bucket(
    client: &aws_sdk_s3::Client,
    region: &str,
    bucket_name: &str,
) -> Result<Resource, ScanError> {
    client
        .head_bucket()
        .bucket(bucket_name)
        .send()
        .await
        .map_err(|e| ScanError::from(classify_sdk_error(&e.to_string())))?;

    Ok(bucket_resource(bucket_name, None, region))
}

fn map_bucket(bucket: &aws_sdk_s3::types::Bucket, region: &str) -> Option<Resource> {
    let name = bucket.name()?.to_owned();
    let creation_date = bucket.creation_date().map(ToString::to_string);
    Some(bucket_resource(&name, creation_date, region))
}

fn bucket_resource(name: &str, creation_date: Option<String>, region: &str) -> Resource {
    let mut data = serde_json::Map::new();
    if let Some(created) = creation_date {
        data.insert("creation_date".into(), created.into());
    }

    Resource::new(
        format!("{BUCKET_ARN_PREFIX}{name}"),
        "aws.s3.bucket",
        CloudProvider::Aws,
        name,
        SCANNER_ACTOR,
    )
    .with_data(data)
    .with_metadata(ResourceMetadata::new(SCANNER_ACTOR).with_region(region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::types::Bucket;

    #[test]
    fn maps_bucket_to_canonical_resource() {
        let bucket = Bucket::builder().name("artifact-store").build();
        let resource = map_bucket(&bucket, "us-east-1").expect("mapped");

        assert_eq!(resource.id, "arn:aws:s3:::artifact-store");
        assert_eq!(resource.resource_type, "aws.s3.bucket");
        assert_eq!(resource.name, "artifact-store");
        assert_eq!(resource.metadata.region.as_deref(), Some("us-east-1"));
        assert!(resource.validate().is_ok());
    }

    #[test]
    fn bucket_without_name_is_skipped() {
        let bucket = Bucket::builder().build();
        assert!(map_bucket(&bucket, "us-east-1").is_none());
    }
}
