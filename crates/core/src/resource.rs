use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationReason};
use crate::provider::CloudProvider;

/// Structured metadata attached to every resource.
///
/// `created_by` and `modified_by` are required; everything else is optional
/// context used by filter queries and relationship discovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Actor that created the resource.
    pub created_by: String,

    /// Actor that last modified the resource.
    pub modified_by: String,

    /// Provider region the resource lives in (e.g. `"us-east-1"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Deployment environment label (e.g. `"production"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Cost-center label for chargeback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,

    /// Free-form tags copied from the provider or supplied by the caller.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// Free-form IAM / access-control payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam: Option<serde_json::Value>,

    /// Free-form extension payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,

    /// When a provider scan last observed this resource. Stamped by the
    /// scan manager, never set by callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl ResourceMetadata {
    /// Create metadata with the given actor as both creator and modifier.
    pub fn new(actor: impl Into<String>) -> Self {
        let actor = actor.into();
        Self {
            created_by: actor.clone(),
            modified_by: actor,
            ..Self::default()
        }
    }

    /// Set the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the cost center.
    #[must_use]
    pub fn with_cost_center(mut self, cost_center: impl Into<String>) -> Self {
        self.cost_center = Some(cost_center.into());
        self
    }

    /// Add a single tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replace all tags.
    #[must_use]
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the IAM payload.
    #[must_use]
    pub fn with_iam(mut self, iam: serde_json::Value) -> Self {
        self.iam = Some(iam);
        self
    }

    /// Set the custom extension payload.
    #[must_use]
    pub fn with_custom(mut self, custom: serde_json::Value) -> Self {
        self.custom = Some(custom);
        self
    }
}

/// A single cloud object or custom entity tracked by the inventory plane.
///
/// Resources are value types: the store hands them out by copy, and services
/// never share references to internal mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Stable identifier, unique across the store. For scanned resources
    /// this is the provider's own id (instance id, ARN, bucket name, ...).
    pub id: String,

    /// Dot-notation type tag (e.g. `aws.ec2.instance`, `custom.app`).
    #[serde(rename = "type")]
    pub resource_type: String,

    /// The provider this resource belongs to.
    pub provider: CloudProvider,

    /// Human-readable label.
    pub name: String,

    /// The original provider-shaped payload.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,

    /// Structured metadata.
    pub metadata: ResourceMetadata,

    /// Dense embedding of the resource's data and metadata. `None` when no
    /// embedder is configured; such resources are invisible to vector
    /// search but fully visible to list and text search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,

    /// Optional parent resource id, forming a forest of parent->child edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// When the resource was created in the store.
    pub created_at: DateTime<Utc>,

    /// When the resource was last modified in the store.
    pub modified_at: DateTime<Utc>,
}

impl Resource {
    /// Create a new resource with required fields. Both timestamps are set
    /// to now and the actor becomes creator and modifier.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        provider: CloudProvider,
        name: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            provider,
            name: name.into(),
            data: serde_json::Map::new(),
            metadata: ResourceMetadata::new(actor),
            vector: None,
            parent_id: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Replace the data payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Map<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    /// Replace the metadata, preserving nothing.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ResourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the embedding vector.
    #[must_use]
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Set the parent resource id.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Check every structural invariant.
    ///
    /// The provider tag is valid by construction; vector width is checked
    /// separately via [`validate_vector`](Self::validate_vector) because the
    /// dimension is a store-wide setting, not a property of the value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::empty("id"));
        }
        if self.resource_type.is_empty() {
            return Err(ValidationError::empty("type"));
        }
        if self.name.is_empty() {
            return Err(ValidationError::empty("name"));
        }
        if self.metadata.created_by.is_empty() {
            return Err(ValidationError::empty("metadata.created_by"));
        }
        if self.metadata.modified_by.is_empty() {
            return Err(ValidationError::empty("metadata.modified_by"));
        }
        if self.modified_at < self.created_at {
            return Err(ValidationError::new(
                "modified_at",
                ValidationReason::TimestampOrder,
            ));
        }
        Ok(())
    }

    /// Check that the vector, when present, matches the given dimension.
    pub fn validate_vector(&self, dimension: usize) -> Result<(), ValidationError> {
        match &self.vector {
            Some(v) if v.len() != dimension => Err(ValidationError::new(
                "vector",
                ValidationReason::DimensionMismatch {
                    expected: dimension,
                    actual: v.len(),
                },
            )),
            _ => Ok(()),
        }
    }
}
