use async_trait::async_trait;

use stratus_audit::{ChangeRecord, Operation};
use stratus_core::{ChangeSet, CloudProvider, Resource, ResourceSchema, SearchQuery, TerraformKey};

use crate::error::StoreError;

/// The audit content accompanying a mutation.
///
/// The caller supplies operation, diff, and actor; the backend resolves
/// `previous_hash` under the per-resource lock and builds the final record
/// inside the same transaction as the row mutation.
#[derive(Debug, Clone)]
pub struct NewChange {
    /// Which lifecycle transition is being recorded.
    pub operation: Operation,
    /// Diff for updates, full snapshot for creates, final snapshot for
    /// deletes.
    pub changes: ChangeSet,
    /// Who performed the transition.
    pub actor: String,
}

impl NewChange {
    /// Build the audit content for a mutation.
    pub fn new(operation: Operation, changes: ChangeSet, actor: impl Into<String>) -> Self {
        Self {
            operation,
            changes,
            actor: actor.into(),
        }
    }
}

/// Trait for inventory persistence backends.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Every mutation executes as **one transaction** spanning the row change
/// and the audit append: if either fails, neither is visible. Concurrent
/// mutations of the same resource serialize on a row-scope lock so each
/// resource's chain stays fork-free; mutations of different resources may
/// proceed in parallel.
///
/// Resources and records are value types: handed out by copy, never shared
/// mutably.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a resource and append its audit record.
    ///
    /// Fails with [`StoreError::Duplicate`] when the id exists and
    /// [`StoreError::ForeignKey`] when `parent_id` references an unknown
    /// resource.
    async fn create_resource(
        &self,
        resource: &Resource,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError>;

    /// Fetch a resource by id. Returns `None` when absent.
    async fn get_resource(&self, id: &str) -> Result<Option<Resource>, StoreError>;

    /// Replace a resource row and append its audit record.
    ///
    /// Fails with [`StoreError::NotFound`] when the id is absent. The
    /// stored `created_at` is preserved regardless of the value supplied.
    async fn update_resource(
        &self,
        resource: &Resource,
        change: NewChange,
    ) -> Result<ChangeRecord, StoreError>;

    /// Remove a resource row and append its audit record. The chain is
    /// retained for historical verification.
    async fn delete_resource(&self, id: &str, change: NewChange)
    -> Result<ChangeRecord, StoreError>;

    /// Structural query with filters, pagination, and ordering.
    async fn list_resources(&self, query: &SearchQuery) -> Result<Vec<Resource>, StoreError>;

    /// Case-insensitive substring match against `name` and the serialized
    /// `data` payload, with the same filters and ordering as
    /// [`list_resources`](Self::list_resources).
    async fn text_search(&self, query: &SearchQuery) -> Result<Vec<Resource>, StoreError>;

    /// Cosine-similarity retrieval over rows with a vector.
    ///
    /// Returns `(resource, similarity)` pairs with `similarity = 1 −
    /// cosine_distance`, strictly greater than `threshold`, in descending
    /// similarity order, capped at `limit`.
    async fn vector_search(
        &self,
        vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Resource, f32)>, StoreError>;

    /// Children of a resource in `created_at` descending order.
    async fn get_by_parent(&self, parent_id: &str) -> Result<Vec<Resource>, StoreError>;

    /// The full audit chain for a resource id, timestamp-ascending. Works
    /// for deleted resources.
    async fn get_chain(&self, resource_id: &str) -> Result<Vec<ChangeRecord>, StoreError>;

    /// The newest audit record for a resource id, if any.
    async fn latest_record(&self, resource_id: &str)
    -> Result<Option<ChangeRecord>, StoreError>;

    /// Insert or replace a schema keyed by `(name, provider)`.
    async fn put_schema(&self, schema: &ResourceSchema) -> Result<(), StoreError>;

    /// Fetch a schema by identity.
    async fn get_schema(
        &self,
        name: &str,
        provider: CloudProvider,
    ) -> Result<Option<ResourceSchema>, StoreError>;

    /// All registered schemas.
    async fn list_schemas(&self) -> Result<Vec<ResourceSchema>, StoreError>;

    /// Remove a schema. Returns `true` when it existed.
    async fn delete_schema(&self, name: &str, provider: CloudProvider)
    -> Result<bool, StoreError>;

    /// Insert or replace a terraform key; `updated_at` is refreshed and the
    /// original `created_at` preserved on overwrite.
    async fn put_terraform_key(&self, key: &TerraformKey) -> Result<(), StoreError>;

    /// Fetch a terraform key.
    async fn get_terraform_key(&self, key: &str) -> Result<Option<TerraformKey>, StoreError>;

    /// All terraform keys whose `path` starts with the given prefix, key
    /// ascending. An empty prefix lists everything.
    async fn list_terraform_keys(&self, path_prefix: &str)
    -> Result<Vec<TerraformKey>, StoreError>;

    /// Remove a terraform key. Returns `true` when it existed.
    async fn delete_terraform_key(&self, key: &str) -> Result<bool, StoreError>;

    /// The store-wide vector dimension. Vectors of any other width are
    /// rejected on write and on search.
    fn vector_dimension(&self) -> usize;
}
