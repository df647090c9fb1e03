use serde::{Deserialize, Serialize};

use stratus_core::{CloudProvider, MetadataPatch};

/// Request to create a resource through the write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceRequest {
    /// Client-supplied id. When absent a random id is generated; generated
    /// ids are retried on collision, caller-supplied ids are not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Dot-notation type tag.
    #[serde(rename = "type")]
    pub resource_type: String,

    /// The provider this resource belongs to.
    pub provider: CloudProvider,

    /// Human-readable label.
    pub name: String,

    /// The provider-shaped payload.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,

    /// Optional metadata fields beyond the actor bookkeeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataPatch>,

    /// Optional parent resource id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl CreateResourceRequest {
    /// Create a minimal request.
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        provider: CloudProvider,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            resource_type: resource_type.into(),
            provider,
            name: name.into(),
            data: serde_json::Map::new(),
            metadata: None,
            parent_id: None,
        }
    }

    /// Set a client-supplied id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the data payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Map<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    /// Set metadata fields.
    #[must_use]
    pub fn with_metadata(mut self, metadata: MetadataPatch) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the parent id.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Outcome counts of a scan-ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Resources that did not exist and were created.
    pub created: usize,
    /// Resources that existed and changed.
    pub updated: usize,
    /// Resources that existed with no effective change.
    pub unchanged: usize,
    /// Resources that failed validation or storage.
    pub failed: usize,
}
