//! Service layer of the inventory plane.
//!
//! [`ResourceService`] is the single write path: it validates with the core
//! model, embeds through the configured [`Embedder`](stratus_embedding::Embedder),
//! and hands the store one transactional mutation pairing the row change
//! with its audit record. [`SearchService`] composes the store's retrieval
//! primitives into semantic, similarity, and relationship queries, and
//! fronts the scan manager.

pub mod error;
pub mod requests;
pub mod resources;
pub mod search;

pub use error::ServiceError;
pub use requests::{CreateResourceRequest, IngestSummary};
pub use resources::{ResourceService, ServiceConfig};
pub use search::{
    RelationshipConfig, RelationshipDirection, ResourceRelationship, SearchHit, SearchService,
};

use tokio_util::sync::CancellationToken;

/// Await a store operation while honoring the caller's cancellation
/// context. On cancellation the in-flight operation is dropped; the store's
/// transaction rolls back with it.
pub(crate) async fn with_cancel<T>(
    ctx: &CancellationToken,
    operation: impl Future<Output = Result<T, stratus_store::StoreError>>,
) -> Result<T, ServiceError> {
    tokio::select! {
        () = ctx.cancelled() => Err(ServiceError::Cancelled),
        result = operation => result.map_err(ServiceError::from),
    }
}
