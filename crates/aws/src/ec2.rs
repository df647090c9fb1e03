use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use stratus_core::{CloudProvider, Resource, ResourceMetadata};
use stratus_scanner::ScanError;

use crate::error::classify_sdk_error;

/// Actor recorded on resources produced by this scanner.
pub(crate) const SCANNER_ACTOR: &str = "aws-scanner";

/// Enumerate all EC2 instances in the region into canonical resources.
///
/// Pages through `describe_instances`; on a mid-scan failure or
/// cancellation, returns [`ScanError::Partial`] carrying the instances
/// collected so far.
pub(crate) async fn scan_instances(
    client: &aws_sdk_ec2::Client,
    region: &str,
    ctx: &CancellationToken,
) -> Result<Vec<Resource>, ScanError> {
    let mut resources = Vec::new();
    let mut pages = client.describe_instances().into_paginator().send();

    loop {
        if ctx.is_cancelled() {
            return Err(ScanError::partial(resources, ScanError::Cancelled));
        }
        let Some(page) = pages.next().await else {
            break;
        };
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                return Err(ScanError::partial(
                    resources,
                    classify_sdk_error(&e.to_string()).into(),
                ));
            }
        };

        for reservation in page.reservations() {
            for instance in reservation.instances() {
                if let Some(resource) = map_instance(instance, region) {
                    resources.push(resource);
                }
            }
        }
    }

    debug!(count = resources.len(), "EC2 instances enumerated");
    Ok(resources)
}

/// Fetch a single instance by id.
pub(crate) async fn get_instance(
    client: &aws_sdk_ec2::Client,
    region: &str,
    instance_id: &str,
) -> Result<Resource, ScanError> {
    let result = client
        .describe_instances()
        .instance_ids(instance_id)
        .send()
        .await
        .map_err(|e| ScanError::from(classify_sdk_error(&e.to_string())))?;

    result
        .reservations()
        .iter()
        .flat_map(aws_sdk_ec2::types::Reservation::instances)
        .find_map(|instance| map_instance(instance, region))
        .ok_or_else(|| ScanError::ServiceError(format!("instance not found: {instance_id}")))
}

/// Map a provider-native instance into the canonical resource shape.
///
/// The instance id is the resource id; the `Name` tag (when present) is the
/// human label; the normalized state is embedded into `data`.
fn map_instance(instance: &aws_sdk_ec2::types::Instance, region: &str) -> Option<Resource> {
    let id = instance.instance_id()?.to_owned();

    let tags: BTreeMap<String, String> = instance
        .tags()
        .iter()
        .filter_map(|tag| Some((tag.key()?.to_owned(), tag.value()?.to_owned())))
        .collect();
    let name = tags.get("Name").cloned().unwrap_or_else(|| id.clone());

    let state = instance
        .state()
        .and_then(|s| s.name())
        .map_or("unknown", aws_sdk_ec2::types::InstanceStateName::as_str);

    let mut data = serde_json::Map::new();
    data.insert(
        "instance_type".into(),
        instance
            .instance_type()
            .map_or("unknown", aws_sdk_ec2::types::InstanceType::as_str)
            .into(),
    );
    data.insert("state".into(), state.into());
    if let Some(az) = instance.placement().and_then(|p| p.availability_zone()) {
        data.insert("availability_zone".into(), az.into());
    }
    if let Some(image_id) = instance.image_id() {
        data.insert("image_id".into(), image_id.into());
    }
    if let Some(vpc_id) = instance.vpc_id() {
        data.insert("vpc_id".into(), vpc_id.into());
    }
    if let Some(subnet_id) = instance.subnet_id() {
        data.insert("subnet_id".into(), subnet_id.into());
    }
    if let Some(private_ip) = instance.private_ip_address() {
        data.insert("private_ip".into(), private_ip.into());
    }
    if let Some(public_ip) = instance.public_ip_address() {
        data.insert("public_ip".into(), public_ip.into());
    }
    if let Some(launch_time) = instance.launch_time() {
        data.insert("launch_time".into(), launch_time.to_string().into());
    }

    let mut metadata = ResourceMetadata::new(SCANNER_ACTOR).with_region(region);
    if let Some(environment) = tags.get("environment").or_else(|| tags.get("env")) {
        metadata = metadata.with_environment(environment.clone());
    }
    metadata = metadata.with_tags(tags);

    Some(
        Resource::new(id, "aws.ec2.instance", CloudProvider::Aws, name, SCANNER_ACTOR)
            .with_data(data)
            .with_metadata(metadata),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{Instance, InstanceState, InstanceStateName, InstanceType, Tag};

    fn tag(key: &str, value: &str) -> Tag {
        Tag::builder().key(key).value(value).build()
    }

    fn sample_instance() -> Instance {
        Instance::builder()
            .instance_id("i-0abc123")
            .instance_type(InstanceType::T3Small)
            .state(
                InstanceState::builder()
                    .name(InstanceStateName::Running)
                    .build(),
            )
            .private_ip_address("10.0.1.5")
            .vpc_id("vpc-42")
            .tags(tag("Name", "web-1"))
            .tags(tag("environment", "production"))
            .tags(tag("team", "platform"))
            .build()
    }

    #[test]
    fn maps_instance_to_canonical_resource() {
        let resource = map_instance(&sample_instance(), "us-east-1").expect("mapped");

        assert_eq!(resource.id, "i-0abc123");
        assert_eq!(resource.resource_type, "aws.ec2.instance");
        assert_eq!(resource.provider, CloudProvider::Aws);
        assert_eq!(resource.name, "web-1");
        assert_eq!(resource.data["instance_type"], "t3.small");
        assert_eq!(resource.data["state"], "running");
        assert_eq!(resource.data["private_ip"], "10.0.1.5");
        assert_eq!(resource.data["vpc_id"], "vpc-42");
        assert_eq!(resource.metadata.region.as_deref(), Some("us-east-1"));
        assert_eq!(
            resource.metadata.environment.as_deref(),
            Some("production")
        );
        assert_eq!(
            resource.metadata.tags.get("team").map(String::as_str),
            Some("platform")
        );
        assert!(resource.validate().is_ok());
    }

    #[test]
    fn unnamed_instance_falls_back_to_id() {
        let instance = Instance::builder().instance_id("i-noname").build();
        let resource = map_instance(&instance, "us-east-1").expect("mapped");
        assert_eq!(resource.name, "i-noname");
        assert_eq!(resource.data["instance_type"], "unknown");
        assert_eq!(resource.data["state"], "unknown");
    }

    #[test]
    fn instance_without_id_is_skipped() {
        let instance = Instance::builder().build();
        assert!(map_instance(&instance, "us-east-1").is_none());
    }
}
