use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationReason};
use crate::provider::CloudProvider;

/// A named descriptor for a custom resource type, identified by
/// `(name, provider)` and versioned by `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Schema name, unique per provider.
    pub name: String,

    /// Provider this schema applies to.
    pub provider: CloudProvider,

    /// The resource type tag the schema describes (e.g. `custom.app`).
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Monotonically increasing schema version.
    pub version: u32,

    /// JSON-schema-like mapping: a `required` list and a `properties` map
    /// of `{field: {"type": tag}}` entries.
    pub schema: serde_json::Map<String, serde_json::Value>,

    /// Human description.
    #[serde(default)]
    pub description: String,

    /// When the schema was registered.
    pub created_at: DateTime<Utc>,
}

impl ResourceSchema {
    /// Create a version-1 schema registered now.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        provider: CloudProvider,
        resource_type: impl Into<String>,
        schema: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            resource_type: resource_type.into(),
            version: 1,
            schema,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// Validate a data payload against a schema mapping.
///
/// Shallow validation only: the `required` list must be satisfied and each
/// key listed under `properties` with a `type` tag must match the JSON type
/// of the corresponding value (`string`, `number`, `integer`, `boolean`,
/// `object`, `array`). Keys not mentioned by the schema pass through.
pub fn validate_data(
    schema: &serde_json::Map<String, serde_json::Value>,
    data: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), ValidationError> {
    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for entry in required {
            if let Some(field) = entry.as_str() {
                if !data.contains_key(field) {
                    return Err(ValidationError::empty(format!("data.{field}")));
                }
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
        for (field, descriptor) in properties {
            let Some(expected) = descriptor.get("type").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(value) = data.get(field) else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(ValidationError::new(
                    format!("data.{field}"),
                    ValidationReason::WrongType {
                        expected: type_tag(expected),
                    },
                ));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &serde_json::Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        // Unknown type tags do not constrain the value.
        _ => true,
    }
}

fn type_tag(expected: &str) -> &'static str {
    match expected {
        "string" => "string",
        "number" => "number",
        "integer" => "integer",
        "boolean" => "boolean",
        "object" => "object",
        "array" => "array",
        _ => "any",
    }
}
