use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use stratus_core::{MAX_LIMIT, Resource, SearchQuery, ValidationError};
use stratus_embedding::Embedder;
use stratus_scanner::{ScanManager, ScanReport};
use stratus_store::InventoryStore;

use crate::error::ServiceError;
use crate::with_cancel;

/// A retrieval result with its similarity score when the query went
/// through the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matched resource.
    pub resource: Resource,
    /// Cosine similarity to the query; `None` for text-search fallbacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Which way a discovered edge points relative to the source resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipDirection {
    /// Source resource references the target.
    Outbound,
    /// Target references the source resource.
    Inbound,
}

/// A discovered edge between two stored resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRelationship {
    /// The other endpoint of the edge.
    pub target_id: String,
    /// Edge kind (`parent_of`, `child_of`, `references`, `colocated_with`,
    /// `similar_to`).
    pub relationship_type: String,
    /// Orientation relative to the source resource.
    pub direction: RelationshipDirection,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f32,
    /// Heuristic-specific detail (e.g. the data path that referenced the
    /// target).
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Thresholds for relationship discovery.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipConfig {
    /// Minimum cosine similarity for the vector heuristic to emit an edge.
    pub similarity_threshold: f32,
    /// Edges below this confidence are dropped before returning.
    pub min_confidence: f32,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            min_confidence: 0.3,
        }
    }
}

/// Read-side orchestration over the store's retrieval primitives plus the
/// scan fan-out. Nothing here mutates state; discovered resources that
/// should be persisted flow back through
/// [`ResourceService`](crate::ResourceService).
pub struct SearchService {
    store: Arc<dyn InventoryStore>,
    embedder: Option<Arc<dyn Embedder>>,
    manager: Arc<ScanManager>,
    config: RelationshipConfig,
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("embedder", &self.embedder.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SearchService {
    /// Create a search service.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>, manager: Arc<ScanManager>) -> Self {
        Self {
            store,
            embedder: None,
            manager,
            config: RelationshipConfig::default(),
        }
    }

    /// Attach an embedder for semantic retrieval.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Override the relationship thresholds.
    #[must_use]
    pub fn with_config(mut self, config: RelationshipConfig) -> Self {
        self.config = config;
        self
    }

    /// Vector retrieval for a free-text query, intersected with structural
    /// filter predicates. Falls back to text search when no embedder is
    /// configured.
    #[instrument(skip(self, ctx, filters))]
    pub async fn semantic_search(
        &self,
        ctx: &CancellationToken,
        query_text: &str,
        filters: &BTreeMap<String, String>,
        limit: u32,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let Some(embedder) = &self.embedder else {
            debug!("no embedder configured, falling back to text search");
            let resources = self.text_search(ctx, query_text, filters, limit).await?;
            return Ok(resources
                .into_iter()
                .map(|resource| SearchHit {
                    resource,
                    similarity: None,
                })
                .collect());
        };

        let vector = embedder
            .embed(query_text)
            .await
            .map_err(|e| ServiceError::Internal(format!("query embedding failed: {e}")))?;

        // The page size caps silently like every other retrieval path;
        // over-fetch within the cap so filter intersection can still fill
        // the page.
        let capped = limit.min(MAX_LIMIT);
        let fetch = capped.saturating_mul(4).min(MAX_LIMIT);
        let hits = with_cancel(
            ctx,
            self.store.vector_search(&vector, 0.0, fetch as usize),
        )
        .await?;

        Ok(hits
            .into_iter()
            .filter(|(resource, _)| matches_filters(resource, filters))
            .take(capped as usize)
            .map(|(resource, similarity)| SearchHit {
                resource,
                similarity: Some(similarity),
            })
            .collect())
    }

    /// Case-insensitive substring search with structural filters.
    pub async fn text_search(
        &self,
        ctx: &CancellationToken,
        query_text: &str,
        filters: &BTreeMap<String, String>,
        limit: u32,
    ) -> Result<Vec<Resource>, ServiceError> {
        let query = SearchQuery {
            text: Some(query_text.to_owned()),
            filters: filters.clone(),
            limit: Some(limit),
            ..SearchQuery::default()
        };
        query.validate()?;
        with_cancel(ctx, self.store.text_search(&query)).await
    }

    /// Resources most similar to a stored resource, excluding the resource
    /// itself. The source must carry a vector.
    #[instrument(skip(self, ctx))]
    pub async fn similarity_search(
        &self,
        ctx: &CancellationToken,
        resource_id: &str,
        limit: u32,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let source = with_cancel(ctx, self.store.get_resource(resource_id))
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                id: resource_id.to_owned(),
            })?;
        let Some(vector) = &source.vector else {
            return Err(ValidationError::empty("vector").into());
        };

        let hits = with_cancel(
            ctx,
            self.store
                .vector_search(vector, -1.0, limit as usize + 1),
        )
        .await?;

        Ok(hits
            .into_iter()
            .filter(|(resource, _)| resource.id != resource_id)
            .take(limit as usize)
            .map(|(resource, similarity)| SearchHit {
                resource,
                similarity: Some(similarity),
            })
            .collect())
    }

    /// Derive candidate edges for a resource from structural references,
    /// shared placement, and vector similarity. Each heuristic emits a
    /// confidence in `[0, 1]`; edges below the configured minimum are
    /// dropped, and the caller is expected to filter further.
    #[instrument(skip(self, ctx))]
    pub async fn discover_relationships(
        &self,
        ctx: &CancellationToken,
        resource_id: &str,
    ) -> Result<Vec<ResourceRelationship>, ServiceError> {
        let resource = with_cancel(ctx, self.store.get_resource(resource_id))
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                id: resource_id.to_owned(),
            })?;

        let mut edges = Vec::new();
        self.hierarchy_edges(ctx, &resource, &mut edges).await?;
        self.reference_edges(ctx, &resource, &mut edges).await?;
        self.placement_edges(ctx, &resource, &mut edges).await?;
        self.similarity_edges(ctx, &resource, &mut edges).await?;

        edges.retain(|edge| edge.confidence >= self.config.min_confidence);
        edges.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(edges)
    }

    /// Front-end to the scan manager for a subset of providers. Results
    /// are reported, not persisted; feed them through
    /// [`ResourceService::ingest_scanned`](crate::ResourceService::ingest_scanned)
    /// to store them.
    pub async fn scan_providers(
        &self,
        ctx: &CancellationToken,
        providers: &[String],
    ) -> ScanReport {
        if providers.is_empty() {
            self.manager.scan_all(ctx).await
        } else {
            self.manager.scan_providers(ctx, providers).await
        }
    }

    async fn hierarchy_edges(
        &self,
        ctx: &CancellationToken,
        resource: &Resource,
        edges: &mut Vec<ResourceRelationship>,
    ) -> Result<(), ServiceError> {
        if let Some(parent_id) = &resource.parent_id {
            edges.push(ResourceRelationship {
                target_id: parent_id.clone(),
                relationship_type: "child_of".to_owned(),
                direction: RelationshipDirection::Outbound,
                confidence: 1.0,
                properties: serde_json::Map::new(),
            });
        }
        for child in with_cancel(ctx, self.store.get_by_parent(&resource.id)).await? {
            edges.push(ResourceRelationship {
                target_id: child.id,
                relationship_type: "parent_of".to_owned(),
                direction: RelationshipDirection::Outbound,
                confidence: 1.0,
                properties: serde_json::Map::new(),
            });
        }
        Ok(())
    }

    async fn reference_edges(
        &self,
        ctx: &CancellationToken,
        resource: &Resource,
        edges: &mut Vec<ResourceRelationship>,
    ) -> Result<(), ServiceError> {
        let mut references = Vec::new();
        collect_string_values("data", &resource.data, &mut references);
        if references.is_empty() {
            return Ok(());
        }

        let all = with_cancel(
            ctx,
            self.store
                .list_resources(&SearchQuery::default().with_limit(MAX_LIMIT)),
        )
        .await?;
        let known: BTreeMap<&str, ()> = all.iter().map(|r| (r.id.as_str(), ())).collect();

        for (path, value) in references {
            if value != resource.id && known.contains_key(value.as_str()) {
                let mut properties = serde_json::Map::new();
                properties.insert("path".into(), path.into());
                edges.push(ResourceRelationship {
                    target_id: value,
                    relationship_type: "references".to_owned(),
                    direction: RelationshipDirection::Outbound,
                    confidence: 0.9,
                    properties,
                });
            }
        }
        Ok(())
    }

    async fn placement_edges(
        &self,
        ctx: &CancellationToken,
        resource: &Resource,
        edges: &mut Vec<ResourceRelationship>,
    ) -> Result<(), ServiceError> {
        let (Some(environment), Some(region)) = (
            resource.metadata.environment.as_deref(),
            resource.metadata.region.as_deref(),
        ) else {
            return Ok(());
        };

        let colocated = with_cancel(
            ctx,
            self.store.list_resources(
                &SearchQuery::default()
                    .with_filter("environment", environment)
                    .with_filter("region", region)
                    .with_limit(MAX_LIMIT),
            ),
        )
        .await?;

        for other in colocated {
            if other.id == resource.id {
                continue;
            }
            let mut properties = serde_json::Map::new();
            properties.insert("environment".into(), environment.into());
            properties.insert("region".into(), region.into());
            edges.push(ResourceRelationship {
                target_id: other.id,
                relationship_type: "colocated_with".to_owned(),
                direction: RelationshipDirection::Outbound,
                confidence: 0.5,
                properties,
            });
        }
        Ok(())
    }

    async fn similarity_edges(
        &self,
        ctx: &CancellationToken,
        resource: &Resource,
        edges: &mut Vec<ResourceRelationship>,
    ) -> Result<(), ServiceError> {
        let Some(vector) = &resource.vector else {
            return Ok(());
        };

        let hits = with_cancel(
            ctx,
            self.store
                .vector_search(vector, self.config.similarity_threshold, 20),
        )
        .await?;

        for (other, similarity) in hits {
            if other.id == resource.id {
                continue;
            }
            edges.push(ResourceRelationship {
                target_id: other.id,
                relationship_type: "similar_to".to_owned(),
                direction: RelationshipDirection::Outbound,
                confidence: similarity.clamp(0.0, 1.0),
                properties: serde_json::Map::new(),
            });
        }
        Ok(())
    }
}

/// Whether a resource satisfies every filter predicate (same semantics as
/// the store's structural filters).
fn matches_filters(resource: &Resource, filters: &BTreeMap<String, String>) -> bool {
    filters.iter().all(|(key, value)| match key.as_str() {
        "region" => resource.metadata.region.as_deref() == Some(value),
        "environment" => resource.metadata.environment.as_deref() == Some(value),
        "cost_center" => resource.metadata.cost_center.as_deref() == Some(value),
        _ => key
            .strip_prefix("tag:")
            .is_some_and(|tag| resource.metadata.tags.get(tag) == Some(value)),
    })
}

/// Recursively collect every string value inside a data payload together
/// with its dotted path.
fn collect_string_values(
    prefix: &str,
    map: &serde_json::Map<String, serde_json::Value>,
    out: &mut Vec<(String, String)>,
) {
    for (key, value) in map {
        collect_from_value(&format!("{prefix}.{key}"), value, out);
    }
}

fn collect_from_value(path: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::String(s) => out.push((path.to_owned(), s.clone())),
        serde_json::Value::Object(map) => collect_string_values(path, map, out),
        serde_json::Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_from_value(&format!("{path}[{index}]"), item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stratus_core::{CloudProvider, ResourceMetadata};

    fn resource_with_metadata() -> Resource {
        Resource::new("r1", "ec2.instance", CloudProvider::Aws, "web", "alice").with_metadata(
            ResourceMetadata::new("alice")
                .with_region("us-east-1")
                .with_environment("production")
                .with_tag("team", "platform"),
        )
    }

    #[test]
    fn filters_match_metadata_fields() {
        let resource = resource_with_metadata();
        let mut filters = BTreeMap::new();
        filters.insert("region".to_owned(), "us-east-1".to_owned());
        filters.insert("tag:team".to_owned(), "platform".to_owned());
        assert!(matches_filters(&resource, &filters));

        filters.insert("environment".to_owned(), "staging".to_owned());
        assert!(!matches_filters(&resource, &filters));
    }

    #[test]
    fn empty_filters_match_everything() {
        assert!(matches_filters(&resource_with_metadata(), &BTreeMap::new()));
    }

    #[test]
    fn string_collection_walks_nested_payloads() {
        let data = json!({
            "vpc": "vpc-1",
            "nested": {"subnet": "subnet-9"},
            "zones": ["a", {"id": "z-2"}],
            "count": 3
        })
        .as_object()
        .cloned()
        .unwrap();

        let mut out = Vec::new();
        collect_string_values("data", &data, &mut out);
        out.sort();

        assert!(out.contains(&("data.vpc".to_owned(), "vpc-1".to_owned())));
        assert!(out.contains(&("data.nested.subnet".to_owned(), "subnet-9".to_owned())));
        assert!(out.contains(&("data.zones[0]".to_owned(), "a".to_owned())));
        assert!(out.contains(&("data.zones[1].id".to_owned(), "z-2".to_owned())));
        assert_eq!(out.len(), 4);
    }
}
