//! End-to-end scenarios for the service layer over the in-memory backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use stratus_audit::Operation;
use stratus_core::{
    CloudProvider, MetadataPatch, Resource, ResourceSchema, SearchQuery, UpdateResourceRequest,
    create_snapshot,
};
use stratus_embedding::{Embedder, FailingEmbedder, MockEmbedder};
use stratus_scanner::{ScanError, ScanManager, ScanOutcome, Scanner, ScannerRegistry};
use stratus_service::{
    CreateResourceRequest, ResourceService, SearchService, ServiceConfig, ServiceError,
};
use stratus_store::{InventoryStore, NewChange};
use stratus_store_memory::MemoryStore;

const DIMENSION: usize = 3;

fn ctx() -> CancellationToken {
    CancellationToken::new()
}

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_dimension(DIMENSION))
}

fn service(store: &Arc<MemoryStore>) -> ResourceService {
    ResourceService::new(Arc::clone(store) as Arc<dyn InventoryStore>)
}

fn data_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn web_request() -> CreateResourceRequest {
    CreateResourceRequest::new("ec2.instance", CloudProvider::Aws, "web-1")
        .with_id("r1")
        .with_data(data_map(json!({"instance_type": "t3.small"})))
}

#[tokio::test]
async fn s1_create_then_read() {
    let store = store();
    let service = service(&store);

    let created = service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();
    assert_eq!(created.id, "r1");

    let fetched = service.get_resource(&ctx(), "r1").await.unwrap();
    assert_eq!(fetched.resource_type, "ec2.instance");
    assert_eq!(fetched.provider, CloudProvider::Aws);
    assert_eq!(fetched.name, "web-1");
    assert_eq!(fetched.data["instance_type"], "t3.small");
    assert_eq!(fetched.metadata.created_by, "alice");
    assert_eq!(fetched.metadata.modified_by, "alice");
    assert_eq!(fetched.created_at, fetched.modified_at);

    let chain = service.get_change_history(&ctx(), "r1").await.unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].operation, Operation::Create);
    assert_eq!(chain[0].previous_hash, "");
    assert_eq!(chain[0].actor, "alice");
}

#[tokio::test]
async fn s2_update_diff() {
    let store = store();
    let service = service(&store);
    service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();

    let request = UpdateResourceRequest {
        name: Some("web-1-renamed".into()),
        data: Some(data_map(json!({"instance_type": "t3.medium"}))),
        ..UpdateResourceRequest::default()
    };
    let updated = service
        .update_resource(&ctx(), "r1", request, "bob")
        .await
        .unwrap();

    assert_eq!(updated.name, "web-1-renamed");
    assert_eq!(updated.metadata.modified_by, "bob");
    assert!(updated.modified_at > updated.created_at);

    let chain = service.get_change_history(&ctx(), "r1").await.unwrap();
    assert_eq!(chain.len(), 2);
    let record = &chain[1];
    assert_eq!(record.operation, Operation::Update);
    assert_eq!(record.previous_hash, chain[0].data_hash);

    let name_change = &record.changes["name"];
    assert_eq!(name_change.old, json!("web-1"));
    assert_eq!(name_change.new, json!("web-1-renamed"));
    let type_change = &record.changes["data.instance_type"];
    assert_eq!(type_change.old, json!("t3.small"));
    assert_eq!(type_change.new, json!("t3.medium"));
}

#[tokio::test]
async fn s3_delete_preserves_chain() {
    let store = store();
    let service = service(&store);
    service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();
    service
        .update_resource(
            &ctx(),
            "r1",
            UpdateResourceRequest {
                name: Some("web-1-renamed".into()),
                ..UpdateResourceRequest::default()
            },
            "bob",
        )
        .await
        .unwrap();

    service.delete_resource(&ctx(), "r1", "carol").await.unwrap();

    let err = service.get_resource(&ctx(), "r1").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { id } if id == "r1"));

    let chain = service.get_change_history(&ctx(), "r1").await.unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[2].operation, Operation::Delete);
    assert_eq!(chain[2].actor, "carol");
    // The DELETE record carries the final snapshot.
    assert_eq!(chain[2].changes["name"].old, json!("web-1-renamed"));
    assert_eq!(chain[2].changes["name"].new, serde_json::Value::Null);

    let verification = service.verify_chain(&ctx(), "r1").await.unwrap();
    assert!(verification.verified);
    assert_eq!(verification.chain_length, 3);
}

#[tokio::test]
async fn s4_vector_similarity() {
    let store = store();

    for (id, vector) in [
        ("v1", vec![1.0, 0.0, 0.0]),
        ("v2", vec![0.9, 0.1, 0.0]),
        ("v3", vec![0.0, 1.0, 0.0]),
    ] {
        let mut resource =
            Resource::new(id, "ec2.instance", CloudProvider::Aws, id, "alice");
        resource.vector = Some(vector);
        store
            .create_resource(
                &resource,
                NewChange::new(Operation::Create, create_snapshot(&resource), "alice"),
            )
            .await
            .unwrap();
    }

    let hits = store.vector_search(&[1.0, 0.0, 0.0], 0.5, 10).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|(r, _)| r.id.as_str()).collect();
    assert_eq!(ids, ["v1", "v2"]);
    assert!(hits.iter().all(|(_, similarity)| *similarity > 0.5));

    // Similarity search through the service excludes the source itself.
    let registry = Arc::new(ScannerRegistry::new());
    let search = SearchService::new(
        Arc::clone(&store) as Arc<dyn InventoryStore>,
        Arc::new(ScanManager::new(registry)),
    );
    let similar = search.similarity_search(&ctx(), "v1", 10).await.unwrap();
    let ids: Vec<&str> = similar.iter().map(|hit| hit.resource.id.as_str()).collect();
    assert_eq!(ids, ["v2", "v3"]);
}

#[tokio::test]
async fn s5_concurrent_updates_serialize_into_one_chain() {
    let store = store();
    let service = Arc::new(service(&store));
    service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for actor in ["bob", "carol"] {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .update_resource(
                    &ctx(),
                    "r1",
                    UpdateResourceRequest {
                        name: Some(format!("renamed-by-{actor}")),
                        ..UpdateResourceRequest::default()
                    },
                    actor,
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let chain = service.get_change_history(&ctx(), "r1").await.unwrap();
    assert_eq!(chain.len(), 3);
    // No forks: the second-committed update chains onto the first.
    assert_eq!(chain[1].previous_hash, chain[0].data_hash);
    assert_eq!(chain[2].previous_hash, chain[1].data_hash);
    assert!(service.verify_chain(&ctx(), "r1").await.unwrap().verified);
}

struct StubScanner {
    provider: &'static str,
    fail: bool,
}

impl Scanner for StubScanner {
    fn name(&self) -> &str {
        self.provider
    }

    async fn validate(&self) -> Result<(), ScanError> {
        Ok(())
    }

    async fn scan(&self, _ctx: &CancellationToken) -> Result<Vec<Resource>, ScanError> {
        if self.fail {
            return Err(ScanError::RateLimited);
        }
        Ok(vec![Resource::new(
            "i-1",
            "aws.ec2.instance",
            CloudProvider::Aws,
            "scanned-web",
            "aws-scanner",
        )])
    }

    async fn get_resource(&self, id: &str) -> Result<Resource, ScanError> {
        Err(ScanError::ServiceError(format!("not supported: {id}")))
    }
}

#[tokio::test]
async fn s6_scan_merges_partial_fleet() {
    let mut registry = ScannerRegistry::new();
    registry
        .register(Arc::new(StubScanner {
            provider: "aws",
            fail: false,
        }))
        .unwrap();
    registry
        .register(Arc::new(StubScanner {
            provider: "azure",
            fail: true,
        }))
        .unwrap();
    let manager = ScanManager::new(Arc::new(registry));

    let report = manager.scan_all(&ctx()).await;

    assert!(matches!(report.outcomes["aws"], ScanOutcome::Ok { count: 1 }));
    assert!(matches!(
        report.outcomes["azure"],
        ScanOutcome::Failed { .. }
    ));
    assert_eq!(report.resources.len(), 1);
    assert_eq!(report.resources[0].id, "i-1");
    assert!(report.resources[0].metadata.last_scanned_at.is_some());

    // Scan results persist through the write path.
    let store = store();
    let service = service(&store);
    let summary = service
        .ingest_scanned(&ctx(), report.resources.clone(), "scan-ingest")
        .await
        .unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 0);

    let stored = service.get_resource(&ctx(), "i-1").await.unwrap();
    assert_eq!(stored.metadata.created_by, "scan-ingest");
    assert!(stored.metadata.last_scanned_at.is_some());

    // A second identical scan pass is a no-op.
    let summary = service
        .ingest_scanned(&ctx(), report.resources, "scan-ingest")
        .await
        .unwrap();
    assert_eq!(summary.unchanged, 1);
}

#[tokio::test]
async fn caller_supplied_duplicate_id_is_rejected() {
    let store = store();
    let service = service(&store);
    service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();

    let err = service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Duplicate { id } if id == "r1"));
}

#[tokio::test]
async fn unknown_parent_is_rejected() {
    let store = store();
    let service = service(&store);

    let request = web_request().with_parent("vpc-missing");
    let err = service
        .create_resource(&ctx(), request, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ForeignKey { parent_id } if parent_id == "vpc-missing"));
}

#[tokio::test]
async fn empty_update_returns_current_without_a_record() {
    let store = store();
    let service = service(&store);
    service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();

    let unchanged = service
        .update_resource(&ctx(), "r1", UpdateResourceRequest::default(), "bob")
        .await
        .unwrap();
    // No effective change: the modifier is not recorded and no audit
    // record is appended.
    assert_eq!(unchanged.metadata.modified_by, "alice");
    let chain = service.get_change_history(&ctx(), "r1").await.unwrap();
    assert_eq!(chain.len(), 1);
}

#[tokio::test]
async fn embedding_failure_stores_without_a_vector() {
    let store = store();
    let service = service(&store).with_embedder(Arc::new(FailingEmbedder::new(DIMENSION)));

    let created = service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();
    assert!(created.vector.is_none());

    // Invisible to vector search, visible to lists.
    let hits = store.vector_search(&[1.0, 0.0, 0.0], -1.0, 10).await.unwrap();
    assert!(hits.is_empty());
    let listed = service
        .list_resources(&ctx(), &SearchQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn data_changes_trigger_a_re_embed() {
    let store = store();
    let embedder = Arc::new(MockEmbedder::new(vec![0.5, 0.5, 0.0]));
    let service = service(&store).with_embedder(Arc::clone(&embedder) as Arc<dyn Embedder>);

    service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();
    assert_eq!(embedder.call_count(), 1);

    // A rename alone does not re-embed.
    service
        .update_resource(
            &ctx(),
            "r1",
            UpdateResourceRequest {
                name: Some("renamed".into()),
                ..UpdateResourceRequest::default()
            },
            "bob",
        )
        .await
        .unwrap();
    assert_eq!(embedder.call_count(), 1);

    // A data change does.
    service
        .update_resource(
            &ctx(),
            "r1",
            UpdateResourceRequest {
                data: Some(data_map(json!({"instance_type": "t3.large"}))),
                ..UpdateResourceRequest::default()
            },
            "bob",
        )
        .await
        .unwrap();
    assert_eq!(embedder.call_count(), 2);
}

#[tokio::test]
async fn schema_enforcement_is_opt_in() {
    let store = store();
    let schema = ResourceSchema::new(
        "custom.app",
        CloudProvider::Custom,
        "custom.app",
        data_map(json!({
            "required": ["endpoint"],
            "properties": {"endpoint": {"type": "string"}}
        })),
    );
    store.put_schema(&schema).await.unwrap();

    let request = || {
        CreateResourceRequest::new("custom.app", CloudProvider::Custom, "billing")
            .with_data(data_map(json!({"port": 8080})))
    };

    // Enforcement off: the payload is accepted.
    let lax = service(&store);
    lax.create_resource(&ctx(), request(), "alice").await.unwrap();

    // Enforcement on: the missing required field is a validation error.
    let strict = service(&store).with_config(ServiceConfig {
        enforce_schemas: true,
        ..ServiceConfig::default()
    });
    let err = strict
        .create_resource(&ctx(), request(), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(v) if v.field == "data.endpoint"));
}

#[tokio::test]
async fn cancelled_context_aborts_writes() {
    let store = store();
    let service = service(&store);
    let cancelled = CancellationToken::new();
    cancelled.cancel();

    let err = service
        .create_resource(&cancelled, web_request(), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Cancelled));
    assert!(store.get_resource("r1").await.unwrap().is_none());
}

#[tokio::test]
async fn semantic_search_falls_back_to_text_without_an_embedder() {
    let store = store();
    let service = service(&store);
    service
        .create_resource(&ctx(), web_request(), "alice")
        .await
        .unwrap();

    let search = SearchService::new(
        Arc::clone(&store) as Arc<dyn InventoryStore>,
        Arc::new(ScanManager::new(Arc::new(ScannerRegistry::new()))),
    );
    let hits = search
        .semantic_search(&ctx(), "WEB", &BTreeMap::new(), 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].resource.id, "r1");
    assert!(hits[0].similarity.is_none());
}

#[tokio::test]
async fn semantic_search_caps_oversized_limits() {
    let store = store();
    let embedder = Arc::new(MockEmbedder::new(vec![1.0, 0.0, 0.0]));
    let service =
        service(&store).with_embedder(Arc::clone(&embedder) as Arc<dyn Embedder>);
    for id in ["web-a", "web-b"] {
        service
            .create_resource(
                &ctx(),
                CreateResourceRequest::new("ec2.instance", CloudProvider::Aws, id).with_id(id),
                "alice",
            )
            .await
            .unwrap();
    }

    let search = SearchService::new(
        Arc::clone(&store) as Arc<dyn InventoryStore>,
        Arc::new(ScanManager::new(Arc::new(ScannerRegistry::new()))),
    )
    .with_embedder(embedder as Arc<dyn Embedder>);

    // A limit beyond the cap is valid input: capped silently, never an
    // error.
    let hits = search
        .semantic_search(&ctx(), "web", &BTreeMap::new(), 5000)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|hit| hit.similarity.is_some()));
}

#[tokio::test]
async fn relationship_discovery_combines_heuristics() {
    let store = store();
    let service = service(&store);

    service
        .create_resource(
            &ctx(),
            CreateResourceRequest::new("aws.ec2.vpc", CloudProvider::Aws, "main-vpc")
                .with_id("vpc-1"),
            "alice",
        )
        .await
        .unwrap();
    service
        .create_resource(
            &ctx(),
            CreateResourceRequest::new("aws.ec2.sg", CloudProvider::Aws, "web-sg")
                .with_id("sg-1"),
            "alice",
        )
        .await
        .unwrap();
    service
        .create_resource(
            &ctx(),
            CreateResourceRequest::new("ec2.instance", CloudProvider::Aws, "web-1")
                .with_id("web-1")
                .with_parent("vpc-1")
                .with_data(data_map(json!({"security_group": "sg-1"})))
                .with_metadata(MetadataPatch {
                    region: Some("us-east-1".into()),
                    environment: Some("production".into()),
                    ..MetadataPatch::default()
                }),
            "alice",
        )
        .await
        .unwrap();
    service
        .create_resource(
            &ctx(),
            CreateResourceRequest::new("rds.instance", CloudProvider::Aws, "db-1")
                .with_id("db-1")
                .with_metadata(MetadataPatch {
                    region: Some("us-east-1".into()),
                    environment: Some("production".into()),
                    ..MetadataPatch::default()
                }),
            "alice",
        )
        .await
        .unwrap();

    let search = SearchService::new(
        Arc::clone(&store) as Arc<dyn InventoryStore>,
        Arc::new(ScanManager::new(Arc::new(ScannerRegistry::new()))),
    );
    let edges = search
        .discover_relationships(&ctx(), "web-1")
        .await
        .unwrap();

    let edge = |kind: &str| {
        edges
            .iter()
            .find(|e| e.relationship_type == kind)
            .unwrap_or_else(|| panic!("missing {kind} edge"))
    };

    assert_eq!(edge("child_of").target_id, "vpc-1");
    assert!((edge("child_of").confidence - 1.0).abs() < f32::EPSILON);
    assert_eq!(edge("references").target_id, "sg-1");
    assert_eq!(
        edge("references").properties["path"],
        json!("data.security_group")
    );
    assert_eq!(edge("colocated_with").target_id, "db-1");

    // Confidence ordering is descending.
    assert!(edges.windows(2).all(|w| w[0].confidence >= w[1].confidence));

    // The parent sees the inverse edge.
    let parent_edges = search
        .discover_relationships(&ctx(), "vpc-1")
        .await
        .unwrap();
    assert!(parent_edges
        .iter()
        .any(|e| e.relationship_type == "parent_of" && e.target_id == "web-1"));
}

#[tokio::test]
async fn list_queries_reject_unknown_filters() {
    let store = store();
    let service = service(&store);
    let err = service
        .list_resources(
            &ctx(),
            &SearchQuery::default().with_filter("owner", "alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}
