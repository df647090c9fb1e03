use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceMetadata};

/// Patch for the mutable metadata fields. `created_by` and
/// `last_scanned_at` are owned by the write path and the scan manager and
/// cannot be patched by callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPatch {
    /// Replace the region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Replace the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Replace the cost center.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,

    /// Replace the full tag map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    /// Replace the IAM payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam: Option<serde_json::Value>,

    /// Replace the custom payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

/// A partial update to an existing resource. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateResourceRequest {
    /// Replace the human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Replace the full data payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,

    /// Patch metadata fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataPatch>,

    /// Re-parent the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Detach the resource from its parent. Takes precedence over
    /// `parent_id` when both are set.
    #[serde(default)]
    pub clear_parent: bool,
}

impl UpdateResourceRequest {
    /// Whether the request carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.data.is_none()
            && self.metadata.is_none()
            && self.parent_id.is_none()
            && !self.clear_parent
    }
}

/// Apply a metadata patch onto existing metadata. Actor bookkeeping and
/// the scan stamp are untouched.
pub fn apply_metadata_patch(metadata: &mut ResourceMetadata, patch: &MetadataPatch) {
    if let Some(region) = &patch.region {
        metadata.region = Some(region.clone());
    }
    if let Some(environment) = &patch.environment {
        metadata.environment = Some(environment.clone());
    }
    if let Some(cost_center) = &patch.cost_center {
        metadata.cost_center = Some(cost_center.clone());
    }
    if let Some(tags) = &patch.tags {
        metadata.tags.clone_from(tags);
    }
    if let Some(iam) = &patch.iam {
        metadata.iam = Some(iam.clone());
    }
    if let Some(custom) = &patch.custom {
        metadata.custom = Some(custom.clone());
    }
}

/// Apply an update request, returning the new version of the resource.
///
/// `modified_at` is set to now and `modified_by` to the given modifier;
/// `created_at` and `metadata.created_by` are never touched.
#[must_use]
pub fn apply_update(
    resource: &Resource,
    request: &UpdateResourceRequest,
    modifier: &str,
) -> Resource {
    let mut updated = resource.clone();

    if let Some(name) = &request.name {
        updated.name.clone_from(name);
    }
    if let Some(data) = &request.data {
        updated.data.clone_from(data);
    }
    if let Some(patch) = &request.metadata {
        apply_metadata_patch(&mut updated.metadata, patch);
    }
    if request.clear_parent {
        updated.parent_id = None;
    } else if let Some(parent_id) = &request.parent_id {
        updated.parent_id = Some(parent_id.clone());
    }

    updated.metadata.modified_by = modifier.to_owned();
    updated.modified_at = Utc::now();
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_resources;
    use crate::provider::CloudProvider;

    fn base() -> Resource {
        let mut data = serde_json::Map::new();
        data.insert("instance_type".into(), "t3.small".into());
        Resource::new("r1", "ec2.instance", CloudProvider::Aws, "web-1", "alice").with_data(data)
    }

    #[test]
    fn empty_update_changes_only_bookkeeping() {
        let r = base();
        let updated = apply_update(&r, &UpdateResourceRequest::default(), "bob");
        assert_eq!(updated.name, r.name);
        assert_eq!(updated.data, r.data);
        assert_eq!(updated.created_at, r.created_at);
        assert_eq!(updated.metadata.created_by, "alice");
        assert_eq!(updated.metadata.modified_by, "bob");
        assert!(updated.modified_at >= r.modified_at);
        // Bookkeeping never shows up in the structural diff.
        assert!(diff_resources(&r, &updated).is_empty());
    }

    #[test]
    fn name_and_data_replace() {
        let r = base();
        let mut data = serde_json::Map::new();
        data.insert("instance_type".into(), "t3.medium".into());
        let request = UpdateResourceRequest {
            name: Some("web-1-renamed".into()),
            data: Some(data),
            ..UpdateResourceRequest::default()
        };
        let updated = apply_update(&r, &request, "bob");
        assert_eq!(updated.name, "web-1-renamed");
        assert_eq!(updated.data["instance_type"], "t3.medium");
    }

    #[test]
    fn metadata_patch_leaves_other_fields() {
        let r = base().with_metadata(
            crate::resource::ResourceMetadata::new("alice")
                .with_region("us-east-1")
                .with_environment("dev"),
        );
        let request = UpdateResourceRequest {
            metadata: Some(MetadataPatch {
                environment: Some("production".into()),
                ..MetadataPatch::default()
            }),
            ..UpdateResourceRequest::default()
        };
        let updated = apply_update(&r, &request, "bob");
        assert_eq!(updated.metadata.region.as_deref(), Some("us-east-1"));
        assert_eq!(updated.metadata.environment.as_deref(), Some("production"));
    }

    #[test]
    fn clear_parent_wins_over_parent_id() {
        let r = base().with_parent("vpc-1");
        let request = UpdateResourceRequest {
            parent_id: Some("vpc-2".into()),
            clear_parent: true,
            ..UpdateResourceRequest::default()
        };
        let updated = apply_update(&r, &request, "bob");
        assert!(updated.parent_id.is_none());
    }

    #[test]
    fn is_empty_detects_field_presence() {
        assert!(UpdateResourceRequest::default().is_empty());
        let request = UpdateResourceRequest {
            name: Some("x".into()),
            ..UpdateResourceRequest::default()
        };
        assert!(!request.is_empty());
    }
}
