use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use stratus_audit::{ChainVerification, ChangeRecord, Operation, verify_chain};
use stratus_core::{
    Resource, SearchQuery, UpdateResourceRequest, ValidationError, apply_metadata_patch,
    apply_update, create_snapshot, delete_snapshot, diff_resources, validate_data,
};
use stratus_embedding::{Embedder, resource_embedding_text};
use stratus_store::{InventoryStore, NewChange};

use crate::error::ServiceError;
use crate::requests::{CreateResourceRequest, IngestSummary};
use crate::with_cancel;

/// Tunables for the write path.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// When `true`, a schema registered under a resource's type tag is
    /// enforced against `data` on create and update.
    pub enforce_schemas: bool,

    /// How many fresh ids to try when a generated id collides.
    pub create_id_retries: u32,

    /// Per-call deadline for the embedder.
    pub embed_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enforce_schemas: false,
            create_id_retries: 3,
            embed_timeout: Duration::from_secs(10),
        }
    }
}

/// The write-path coordinator: validates with the core model, embeds via
/// the configured embedder, and issues one transactional store mutation
/// per lifecycle transition.
pub struct ResourceService {
    store: Arc<dyn InventoryStore>,
    embedder: Option<Arc<dyn Embedder>>,
    config: ServiceConfig,
}

impl std::fmt::Debug for ResourceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceService")
            .field("embedder", &self.embedder.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResourceService {
    /// Create a service without an embedder; resources are stored without
    /// vectors and stay invisible to vector search.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            store,
            embedder: None,
            config: ServiceConfig::default(),
        }
    }

    /// Attach an embedder.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Override the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a resource, appending its CREATE record in the same store
    /// transaction.
    ///
    /// Generated ids retry on collision up to the configured budget;
    /// caller-supplied ids surface [`ServiceError::Duplicate`] directly.
    #[instrument(skip(self, ctx, request), fields(resource_type = %request.resource_type, provider = %request.provider))]
    pub async fn create_resource(
        &self,
        ctx: &CancellationToken,
        request: CreateResourceRequest,
        actor: &str,
    ) -> Result<Resource, ServiceError> {
        if actor.is_empty() {
            return Err(ValidationError::empty("actor").into());
        }

        let generated_id = request.id.is_none();
        let mut resource = materialize(request, actor);
        resource.validate()?;
        self.enforce_schema(ctx, &resource).await?;
        self.embed_resource(&mut resource).await?;

        let mut attempts = 0u32;
        loop {
            let change = NewChange::new(Operation::Create, create_snapshot(&resource), actor);
            match with_cancel(ctx, self.store.create_resource(&resource, change)).await {
                Ok(record) => {
                    info!(resource_id = %resource.id, record_id = %record.id, "resource created");
                    return Ok(resource);
                }
                Err(ServiceError::Duplicate { .. })
                    if generated_id && attempts + 1 < self.config.create_id_retries =>
                {
                    attempts += 1;
                    debug!(attempts, "generated id collided, retrying with a fresh id");
                    resource.id = Uuid::new_v4().to_string();
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Apply a partial update. An update with no effective change returns
    /// the current resource without touching the store or the chain.
    #[instrument(skip(self, ctx, request), fields(resource_id = %id))]
    pub async fn update_resource(
        &self,
        ctx: &CancellationToken,
        id: &str,
        request: UpdateResourceRequest,
        actor: &str,
    ) -> Result<Resource, ServiceError> {
        if actor.is_empty() {
            return Err(ValidationError::empty("actor").into());
        }

        let current = self.load(ctx, id).await?;
        let mut updated = apply_update(&current, &request, actor);
        let changes = diff_resources(&current, &updated);
        if changes.is_empty() {
            debug!(resource_id = %id, "update carries no effective change");
            return Ok(current);
        }

        updated.validate()?;
        self.enforce_schema(ctx, &updated).await?;

        let data_changed = changes
            .keys()
            .any(|path| path == "data" || path.starts_with("data."));
        if data_changed {
            self.embed_resource(&mut updated).await?;
        }

        let record = with_cancel(
            ctx,
            self.store
                .update_resource(&updated, NewChange::new(Operation::Update, changes, actor)),
        )
        .await?;
        info!(resource_id = %id, record_id = %record.id, "resource updated");
        Ok(updated)
    }

    /// Delete a resource; its chain is retained and gains a DELETE record
    /// carrying the final snapshot.
    #[instrument(skip(self, ctx), fields(resource_id = %id))]
    pub async fn delete_resource(
        &self,
        ctx: &CancellationToken,
        id: &str,
        actor: &str,
    ) -> Result<(), ServiceError> {
        if actor.is_empty() {
            return Err(ValidationError::empty("actor").into());
        }

        let current = self.load(ctx, id).await?;
        with_cancel(
            ctx,
            self.store.delete_resource(
                id,
                NewChange::new(Operation::Delete, delete_snapshot(&current), actor),
            ),
        )
        .await?;
        info!(resource_id = %id, "resource deleted, chain retained");
        Ok(())
    }

    /// Fetch a resource. A dangling parent reference is surfaced as a
    /// consistency warning, never an error.
    pub async fn get_resource(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<Resource, ServiceError> {
        let resource = self.load(ctx, id).await?;
        if let Some(parent_id) = &resource.parent_id {
            if with_cancel(ctx, self.store.get_resource(parent_id))
                .await?
                .is_none()
            {
                warn!(resource_id = %resource.id, parent_id = %parent_id, "resource references a missing parent");
            }
        }
        Ok(resource)
    }

    /// Structural list with validated, defaulted query parameters.
    pub async fn list_resources(
        &self,
        ctx: &CancellationToken,
        query: &SearchQuery,
    ) -> Result<Vec<Resource>, ServiceError> {
        query.validate()?;
        with_cancel(ctx, self.store.list_resources(query)).await
    }

    /// List or text-search depending on whether the query carries text.
    pub async fn search_resources(
        &self,
        ctx: &CancellationToken,
        query: &SearchQuery,
    ) -> Result<Vec<Resource>, ServiceError> {
        query.validate()?;
        if query.text.as_deref().is_some_and(|text| !text.is_empty()) {
            with_cancel(ctx, self.store.text_search(query)).await
        } else {
            with_cancel(ctx, self.store.list_resources(query)).await
        }
    }

    /// Children of a resource, newest first.
    pub async fn get_resources_by_parent(
        &self,
        ctx: &CancellationToken,
        parent_id: &str,
    ) -> Result<Vec<Resource>, ServiceError> {
        with_cancel(ctx, self.store.get_by_parent(parent_id)).await
    }

    /// The audit chain for a resource id, oldest first. Available after
    /// deletion.
    pub async fn get_change_history(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<Vec<ChangeRecord>, ServiceError> {
        with_cancel(ctx, self.store.get_chain(id)).await
    }

    /// Walk and verify the chain for a resource id.
    pub async fn verify_chain(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<ChainVerification, ServiceError> {
        let chain = with_cancel(ctx, self.store.get_chain(id)).await?;
        Ok(verify_chain(&chain))
    }

    /// Reconcile scanned resources into the store: create the unknown,
    /// update the changed, skip the unchanged.
    #[instrument(skip(self, ctx, resources), fields(count = resources.len()))]
    pub async fn ingest_scanned(
        &self,
        ctx: &CancellationToken,
        resources: Vec<Resource>,
        actor: &str,
    ) -> Result<IngestSummary, ServiceError> {
        if actor.is_empty() {
            return Err(ValidationError::empty("actor").into());
        }

        let mut summary = IngestSummary::default();
        for scanned in resources {
            if ctx.is_cancelled() {
                return Err(ServiceError::Cancelled);
            }
            if let Err(error) = scanned.validate() {
                warn!(resource_id = %scanned.id, %error, "skipping invalid scanned resource");
                summary.failed += 1;
                continue;
            }

            let outcome = match with_cancel(ctx, self.store.get_resource(&scanned.id)).await? {
                Some(current) => self.reconcile_existing(ctx, &current, &scanned, actor).await,
                None => self.ingest_new(ctx, scanned.clone(), actor).await,
            };
            match outcome {
                Ok(IngestOutcome::Created) => summary.created += 1,
                Ok(IngestOutcome::Updated) => summary.updated += 1,
                Ok(IngestOutcome::Unchanged) => summary.unchanged += 1,
                Err(ServiceError::Cancelled) => return Err(ServiceError::Cancelled),
                Err(error) => {
                    warn!(resource_id = %scanned.id, %error, "failed to ingest scanned resource");
                    summary.failed += 1;
                }
            }
        }

        info!(?summary, "scan ingestion finished");
        Ok(summary)
    }

    async fn reconcile_existing(
        &self,
        ctx: &CancellationToken,
        current: &Resource,
        scanned: &Resource,
        actor: &str,
    ) -> Result<IngestOutcome, ServiceError> {
        let mut updated = current.clone();
        updated.name.clone_from(&scanned.name);
        updated.data.clone_from(&scanned.data);
        apply_metadata_patch(
            &mut updated.metadata,
            &stratus_core::MetadataPatch {
                region: scanned.metadata.region.clone(),
                environment: scanned.metadata.environment.clone(),
                cost_center: scanned.metadata.cost_center.clone(),
                tags: Some(scanned.metadata.tags.clone()),
                iam: scanned.metadata.iam.clone(),
                custom: scanned.metadata.custom.clone(),
            },
        );
        if scanned.metadata.last_scanned_at.is_some() {
            updated.metadata.last_scanned_at = scanned.metadata.last_scanned_at;
        }

        let changes = diff_resources(current, &updated);
        if changes.is_empty() {
            return Ok(IngestOutcome::Unchanged);
        }

        updated.metadata.modified_by = actor.to_owned();
        updated.modified_at = Utc::now();
        let data_changed = changes
            .keys()
            .any(|path| path == "data" || path.starts_with("data."));
        if data_changed {
            self.embed_resource(&mut updated).await?;
        }

        with_cancel(
            ctx,
            self.store
                .update_resource(&updated, NewChange::new(Operation::Update, changes, actor)),
        )
        .await?;
        Ok(IngestOutcome::Updated)
    }

    async fn ingest_new(
        &self,
        ctx: &CancellationToken,
        mut resource: Resource,
        actor: &str,
    ) -> Result<IngestOutcome, ServiceError> {
        let now = Utc::now();
        resource.metadata.created_by = actor.to_owned();
        resource.metadata.modified_by = actor.to_owned();
        resource.created_at = now;
        resource.modified_at = now;
        self.embed_resource(&mut resource).await?;

        let change = NewChange::new(Operation::Create, create_snapshot(&resource), actor);
        with_cancel(ctx, self.store.create_resource(&resource, change)).await?;
        Ok(IngestOutcome::Created)
    }

    async fn load(&self, ctx: &CancellationToken, id: &str) -> Result<Resource, ServiceError> {
        with_cancel(ctx, self.store.get_resource(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound { id: id.to_owned() })
    }

    /// Enforce a registered schema when configured. Schemas are looked up
    /// under the resource's type tag; no registered schema means no
    /// enforcement.
    async fn enforce_schema(
        &self,
        ctx: &CancellationToken,
        resource: &Resource,
    ) -> Result<(), ServiceError> {
        if !self.config.enforce_schemas {
            return Ok(());
        }
        if let Some(schema) = with_cancel(
            ctx,
            self.store
                .get_schema(&resource.resource_type, resource.provider),
        )
        .await?
        {
            validate_data(&schema.schema, &resource.data)?;
        }
        Ok(())
    }

    /// Embed the resource, best-effort: a failed or timed-out embed logs a
    /// warning and leaves the vector unset, a vector of the wrong width is
    /// a validation error.
    async fn embed_resource(&self, resource: &mut Resource) -> Result<(), ServiceError> {
        let Some(embedder) = &self.embedder else {
            return Ok(());
        };

        let text = resource_embedding_text(resource);
        match tokio::time::timeout(self.config.embed_timeout, embedder.embed(&text)).await {
            Ok(Ok(vector)) => {
                resource.vector = Some(vector);
                resource.validate_vector(self.store.vector_dimension())?;
                Ok(())
            }
            Ok(Err(error)) => {
                warn!(resource_id = %resource.id, %error, "embedding failed, storing without a vector");
                resource.vector = None;
                Ok(())
            }
            Err(_) => {
                warn!(resource_id = %resource.id, "embedding timed out, storing without a vector");
                resource.vector = None;
                Ok(())
            }
        }
    }
}

enum IngestOutcome {
    Created,
    Updated,
    Unchanged,
}

fn materialize(request: CreateResourceRequest, actor: &str) -> Resource {
    let id = request
        .id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut resource = Resource::new(
        id,
        request.resource_type,
        request.provider,
        request.name,
        actor,
    )
    .with_data(request.data);
    if let Some(patch) = &request.metadata {
        apply_metadata_patch(&mut resource.metadata, patch);
    }
    resource.parent_id = request.parent_id;
    resource
}
