use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A flat keyed scratch entry used by the IaC state-import tooling.
///
/// `key` is unique across the store; `path` is indexed for prefix queries
/// so importers can list everything under a state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformKey {
    /// Unique key.
    pub key: String,

    /// Slash-separated path used for prefix listing.
    pub path: String,

    /// Opaque payload.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,

    /// Opaque metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// When the key was first written.
    pub created_at: DateTime<Utc>,

    /// When the key was last overwritten.
    pub updated_at: DateTime<Utc>,
}

impl TerraformKey {
    /// Create a key written now.
    #[must_use]
    pub fn new(key: impl Into<String>, path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            path: path.into(),
            data: serde_json::Map::new(),
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Map<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    /// Set the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}
