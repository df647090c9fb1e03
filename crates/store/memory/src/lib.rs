//! In-memory [`InventoryStore`] backend.
//!
//! Backs the conformance suite, the service tests, and embedded setups that
//! do not need durability. A single `RwLock` plays the role of the
//! relational backend's transactions: write methods hold the write guard
//! across the row mutation *and* the chain append, so appends for one
//! resource serialize exactly like they do under a row lock, and a failed
//! mutation leaves no partial state behind.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use stratus_audit::{ChainAppender, ChangeRecord};
use stratus_core::{
    CloudProvider, Resource, ResourceSchema, SearchQuery, SortBy, SortOrder, TerraformKey,
};
use stratus_store::{InventoryStore, NewChange, StoreError};

/// Default vector dimension when none is configured.
pub const DEFAULT_DIMENSION: usize = 1536;

#[derive(Default)]
struct Inner {
    resources: HashMap<String, Resource>,
    /// Chains keyed by resource id, timestamp-ascending. Retained after the
    /// resource row is removed.
    records: HashMap<String, Vec<ChangeRecord>>,
    schemas: HashMap<(String, CloudProvider), ResourceSchema>,
    terraform: HashMap<String, TerraformKey>,
}

/// In-memory inventory store.
pub struct MemoryStore {
    appender: ChainAppender,
    dimension: usize,
    inner: RwLock<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store with the default vector dimension and no signer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    /// Create a store with an explicit vector dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            appender: ChainAppender::new(),
            dimension,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Create a store with an explicit dimension and chain appender (for
    /// signed chains).
    #[must_use]
    pub fn with_appender(dimension: usize, appender: ChainAppender) -> Self {
        Self {
            appender,
            dimension,
            inner: RwLock::new(Inner::default()),
        }
    }

    fn check_vector(&self, resource: &Resource) -> Result<(), StoreError> {
        if let Some(vector) = &resource.vector {
            if vector.len() != self.dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }

    fn append(
        inner: &mut Inner,
        appender: &ChainAppender,
        resource_id: &str,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError> {
        let previous_hash = inner
            .records
            .get(resource_id)
            .and_then(|chain| chain.last())
            .map(|record| record.data_hash.clone())
            .unwrap_or_default();

        let record = appender.next_record(
            resource_id,
            change.operation,
            change.changes,
            &change.actor,
            &previous_hash,
        )?;
        inner
            .records
            .entry(resource_id.to_owned())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn matches(resource: &Resource, query: &SearchQuery) -> bool {
        if let Some(provider) = query.provider {
            if resource.provider != provider {
                return false;
            }
        }
        if let Some(resource_type) = &query.resource_type {
            if &resource.resource_type != resource_type {
                return false;
            }
        }
        for (key, value) in &query.filters {
            let matched = match key.as_str() {
                "region" => resource.metadata.region.as_deref() == Some(value),
                "environment" => resource.metadata.environment.as_deref() == Some(value),
                "cost_center" => resource.metadata.cost_center.as_deref() == Some(value),
                _ => key
                    .strip_prefix("tag:")
                    .is_some_and(|tag| resource.metadata.tags.get(tag) == Some(value)),
            };
            if !matched {
                return false;
            }
        }
        true
    }

    fn sort(resources: &mut [Resource], sort_by: SortBy, sort_order: SortOrder) {
        resources.sort_by(|a, b| {
            let ordering = match sort_by {
                SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
                SortBy::ModifiedAt => a.modified_at.cmp(&b.modified_at),
                SortBy::Name => a.name.cmp(&b.name),
            };
            match sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    fn paginate(resources: Vec<Resource>, query: &SearchQuery) -> Vec<Resource> {
        resources
            .into_iter()
            .skip(query.effective_offset() as usize)
            .take(query.effective_limit() as usize)
            .collect()
    }
}

/// Score a stored vector against the query as `1 - cosine_distance`, the
/// same quantity the relational backend computes with pgvector's `<=>`
/// operator. Both sides are already dimension-checked on the way in;
/// accumulation happens in `f64` so long vectors do not lose precision.
/// A zero-magnitude vector has no direction and scores `0.0`.
fn similarity(query: &[f32], stored: &[f32]) -> f32 {
    let mut dot = 0.0_f64;
    let mut query_sq = 0.0_f64;
    let mut stored_sq = 0.0_f64;
    for (q, s) in query.iter().zip(stored) {
        dot += f64::from(*q) * f64::from(*s);
        query_sq += f64::from(*q).powi(2);
        stored_sq += f64::from(*s).powi(2);
    }

    let magnitude = (query_sq * stored_sq).sqrt();
    if magnitude == 0.0 {
        return 0.0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let score = (dot / magnitude) as f32;
    score
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn create_resource(
        &self,
        resource: &Resource,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError> {
        self.check_vector(resource)?;
        let mut inner = self.inner.write().await;

        if inner.resources.contains_key(&resource.id) {
            return Err(StoreError::Duplicate(resource.id.clone()));
        }
        if let Some(parent_id) = &resource.parent_id {
            if !inner.resources.contains_key(parent_id) {
                return Err(StoreError::ForeignKey(parent_id.clone()));
            }
        }

        let record = Self::append(&mut inner, &self.appender, &resource.id, change)?;
        inner
            .resources
            .insert(resource.id.clone(), resource.clone());
        Ok(record)
    }

    async fn get_resource(&self, id: &str) -> Result<Option<Resource>, StoreError> {
        Ok(self.inner.read().await.resources.get(id).cloned())
    }

    async fn update_resource(
        &self,
        resource: &Resource,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError> {
        self.check_vector(resource)?;
        let mut inner = self.inner.write().await;

        let Some(existing) = inner.resources.get(&resource.id) else {
            return Err(StoreError::NotFound(resource.id.clone()));
        };
        let created_at = existing.created_at;
        if let Some(parent_id) = &resource.parent_id {
            if parent_id != &resource.id && !inner.resources.contains_key(parent_id) {
                return Err(StoreError::ForeignKey(parent_id.clone()));
            }
        }

        let record = Self::append(&mut inner, &self.appender, &resource.id, change)?;
        let mut stored = resource.clone();
        stored.created_at = created_at;
        inner.resources.insert(resource.id.clone(), stored);
        Ok(record)
    }

    async fn delete_resource(
        &self,
        id: &str,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.resources.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        // Children are detached rather than left dangling, matching the
        // relational backend's ON DELETE SET NULL.
        for resource in inner.resources.values_mut() {
            if resource.parent_id.as_deref() == Some(id) {
                resource.parent_id = None;
            }
        }
        Self::append(&mut inner, &self.appender, id, change)
    }

    async fn list_resources(&self, query: &SearchQuery) -> Result<Vec<Resource>, StoreError> {
        let inner = self.inner.read().await;
        let mut matched: Vec<Resource> = inner
            .resources
            .values()
            .filter(|r| Self::matches(r, query))
            .cloned()
            .collect();
        Self::sort(&mut matched, query.sort_by, query.sort_order);
        Ok(Self::paginate(matched, query))
    }

    async fn text_search(&self, query: &SearchQuery) -> Result<Vec<Resource>, StoreError> {
        let needle = query
            .text
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let inner = self.inner.read().await;
        let mut matched: Vec<Resource> = inner
            .resources
            .values()
            .filter(|r| Self::matches(r, query))
            .filter(|r| {
                needle.is_empty()
                    || r.name.to_lowercase().contains(&needle)
                    || serde_json::Value::Object(r.data.clone())
                        .to_string()
                        .to_lowercase()
                        .contains(&needle)
            })
            .cloned()
            .collect();
        Self::sort(&mut matched, query.sort_by, query.sort_order);
        Ok(Self::paginate(matched, query))
    }

    async fn vector_search(
        &self,
        vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Resource, f32)>, StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let inner = self.inner.read().await;
        let mut scored: Vec<(Resource, f32)> = inner
            .resources
            .values()
            .filter_map(|r| {
                let stored = r.vector.as_deref()?;
                let score = similarity(vector, stored);
                (score > threshold).then(|| (r.clone(), score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get_by_parent(&self, parent_id: &str) -> Result<Vec<Resource>, StoreError> {
        let inner = self.inner.read().await;
        let mut children: Vec<Resource> = inner
            .resources
            .values()
            .filter(|r| r.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(children)
    }

    async fn get_chain(&self, resource_id: &str) -> Result<Vec<ChangeRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .records
            .get(resource_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_record(
        &self,
        resource_id: &str,
    ) -> Result<Option<ChangeRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .records
            .get(resource_id)
            .and_then(|chain| chain.last())
            .cloned())
    }

    async fn put_schema(&self, schema: &ResourceSchema) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .schemas
            .insert((schema.name.clone(), schema.provider), schema.clone());
        Ok(())
    }

    async fn get_schema(
        &self,
        name: &str,
        provider: CloudProvider,
    ) -> Result<Option<ResourceSchema>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .schemas
            .get(&(name.to_owned(), provider))
            .cloned())
    }

    async fn list_schemas(&self) -> Result<Vec<ResourceSchema>, StoreError> {
        let inner = self.inner.read().await;
        let mut schemas: Vec<ResourceSchema> = inner.schemas.values().cloned().collect();
        schemas.sort_by(|a, b| (&a.name, a.provider).cmp(&(&b.name, b.provider)));
        Ok(schemas)
    }

    async fn delete_schema(
        &self,
        name: &str,
        provider: CloudProvider,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .write()
            .await
            .schemas
            .remove(&(name.to_owned(), provider))
            .is_some())
    }

    async fn put_terraform_key(&self, key: &TerraformKey) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let mut stored = key.clone();
        if let Some(existing) = inner.terraform.get(&key.key) {
            stored.created_at = existing.created_at;
            stored.updated_at = Utc::now();
        }
        inner.terraform.insert(key.key.clone(), stored);
        Ok(())
    }

    async fn get_terraform_key(&self, key: &str) -> Result<Option<TerraformKey>, StoreError> {
        Ok(self.inner.read().await.terraform.get(key).cloned())
    }

    async fn list_terraform_keys(
        &self,
        path_prefix: &str,
    ) -> Result<Vec<TerraformKey>, StoreError> {
        let inner = self.inner.read().await;
        let mut keys: Vec<TerraformKey> = inner
            .terraform
            .values()
            .filter(|k| k.path.starts_with(path_prefix))
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(keys)
    }

    async fn delete_terraform_key(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.terraform.remove(key).is_some())
    }

    fn vector_dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use stratus_audit::{Operation, verify_chain};
    use stratus_core::{create_snapshot, diff_resources};

    #[tokio::test]
    async fn store_conformance() {
        let store = MemoryStore::with_dimension(3);
        stratus_store::testing::run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    async fn insert_with_vector(store: &MemoryStore, id: &str, vector: Option<Vec<f32>>) {
        let mut resource = Resource::new(id, "ec2.instance", CloudProvider::Aws, id, "alice");
        resource.vector = vector;
        store
            .create_resource(
                &resource,
                NewChange::new(Operation::Create, create_snapshot(&resource), "alice"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn search_scores_match_cosine_geometry() {
        let store = MemoryStore::with_dimension(3);
        insert_with_vector(&store, "aligned", Some(vec![2.0, 0.0, 0.0])).await;
        insert_with_vector(&store, "orthogonal", Some(vec![0.0, 3.0, 0.0])).await;
        insert_with_vector(&store, "opposite", Some(vec![-1.0, 0.0, 0.0])).await;

        // Magnitude does not matter, only direction: a scaled copy of the
        // query still scores 1.0 and the opposite direction scores -1.0.
        let hits = store
            .vector_search(&[1.0, 0.0, 0.0], -2.0, 10)
            .await
            .unwrap();
        let scores: Vec<(&str, f32)> = hits
            .iter()
            .map(|(r, score)| (r.id.as_str(), *score))
            .collect();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0].0, "aligned");
        assert!((scores[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(scores[1].0, "orthogonal");
        assert!(scores[1].1.abs() < 1e-6);
        assert_eq!(scores[2].0, "opposite");
        assert!((scores[2].1 + 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn zero_magnitude_vectors_score_zero() {
        let store = MemoryStore::with_dimension(3);
        insert_with_vector(&store, "null-direction", Some(vec![0.0, 0.0, 0.0])).await;

        // Excluded above the zero threshold, visible below it with a 0.0
        // score.
        let hits = store.vector_search(&[1.0, 0.0, 0.0], 0.0, 10).await.unwrap();
        assert!(hits.is_empty());
        let hits = store
            .vector_search(&[1.0, 0.0, 0.0], -1.0, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, 0.0);
    }

    #[tokio::test]
    async fn concurrent_updates_build_a_fork_free_chain() {
        let store = Arc::new(MemoryStore::with_dimension(3));
        let resource = Resource::new("r1", "ec2.instance", CloudProvider::Aws, "web-1", "alice");
        store
            .create_resource(
                &resource,
                NewChange::new(Operation::Create, create_snapshot(&resource), "alice"),
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for actor in ["bob", "carol"] {
            let store = Arc::clone(&store);
            let base = resource.clone();
            handles.push(tokio::spawn(async move {
                let mut updated = base.clone();
                updated.name = format!("renamed-by-{actor}");
                let diff = diff_resources(&base, &updated);
                store
                    .update_resource(&updated, NewChange::new(Operation::Update, diff, actor))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let chain = store.get_chain("r1").await.unwrap();
        assert_eq!(chain.len(), 3);
        assert!(verify_chain(&chain).verified);
        // The second-committed update chains onto the first-committed one.
        assert_eq!(chain[2].previous_hash, chain[1].data_hash);
    }
}
