use stratus_core::{Resource, canonical_json};

/// Build the deterministic embedding input text for a resource.
///
/// Composes the identifying fields, the metadata context, the sorted tag
/// pairs, and the canonical JSON of the data payload. Two resources with
/// identical data and metadata produce identical text, hence identical
/// vectors within one model version.
pub fn resource_embedding_text(resource: &Resource) -> String {
    let mut parts: Vec<String> = vec![
        format!("provider: {}", resource.provider),
        format!("type: {}", resource.resource_type),
        format!("name: {}", resource.name),
    ];

    if let Some(region) = &resource.metadata.region {
        parts.push(format!("region: {region}"));
    }
    if let Some(environment) = &resource.metadata.environment {
        parts.push(format!("environment: {environment}"));
    }
    for (key, value) in &resource.metadata.tags {
        parts.push(format!("tag {key}: {value}"));
    }

    if !resource.data.is_empty() {
        parts.push(format!(
            "data: {}",
            canonical_json(&serde_json::Value::Object(resource.data.clone()))
        ));
    }

    parts.join("\n")
}
