//! Conformance test suite shared by every [`InventoryStore`] backend.
//!
//! Backends call [`run_store_conformance_tests`] from their own test module
//! with a fresh, empty store configured with **vector dimension 3** (the
//! vector tests use literal 3-wide vectors).

use stratus_audit::{Operation, verify_chain};
use stratus_core::{
    CloudProvider, Resource, ResourceMetadata, ResourceSchema, SearchQuery, SortBy, SortOrder,
    TerraformKey, create_snapshot, delete_snapshot, diff_resources,
};

use crate::error::StoreError;
use crate::store::{InventoryStore, NewChange};

fn test_resource(id: &str, name: &str) -> Resource {
    let mut data = serde_json::Map::new();
    data.insert("instance_type".into(), "t3.small".into());
    Resource::new(id, "aws.ec2.instance", CloudProvider::Aws, name, "alice").with_data(data)
}

fn create_change(resource: &Resource) -> NewChange {
    NewChange::new(
        Operation::Create,
        create_snapshot(resource),
        resource.metadata.created_by.clone(),
    )
}

/// Run the full inventory store conformance suite.
///
/// # Errors
///
/// Returns an error if any conformance check fails.
pub async fn run_store_conformance_tests(store: &dyn InventoryStore) -> Result<(), StoreError> {
    assert_eq!(store.vector_dimension(), 3, "suite expects dimension 3");

    test_get_missing(store).await?;
    test_create_and_get(store).await?;
    test_duplicate_create(store).await?;
    test_unknown_parent(store).await?;
    test_children_ordering(store).await?;
    test_update_flow(store).await?;
    test_update_missing(store).await?;
    test_delete_preserves_chain(store).await?;
    test_recreate_extends_chain(store).await?;
    test_list_filters(store).await?;
    test_list_sort_and_pagination(store).await?;
    test_text_search(store).await?;
    test_vector_search(store).await?;
    test_vector_dimension_check(store).await?;
    test_schema_crud(store).await?;
    test_terraform_crud(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn InventoryStore) -> Result<(), StoreError> {
    assert!(store.get_resource("conf-missing").await?.is_none());
    assert!(store.latest_record("conf-missing").await?.is_none());
    assert!(store.get_chain("conf-missing").await?.is_empty());
    Ok(())
}

async fn test_create_and_get(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let resource = test_resource("conf-create", "web-1");
    let record = store
        .create_resource(&resource, create_change(&resource))
        .await?;

    assert_eq!(record.operation, Operation::Create);
    assert_eq!(record.previous_hash, "");
    assert_eq!(record.actor, "alice");

    let fetched = store.get_resource("conf-create").await?.expect("created");
    assert_eq!(fetched.name, "web-1");
    assert_eq!(fetched.data["instance_type"], "t3.small");
    assert_eq!(fetched.created_at, fetched.modified_at);

    let chain = store.get_chain("conf-create").await?;
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].data_hash, record.data_hash);
    Ok(())
}

async fn test_duplicate_create(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let resource = test_resource("conf-dup", "web-1");
    store
        .create_resource(&resource, create_change(&resource))
        .await?;

    let err = store
        .create_resource(&resource, create_change(&resource))
        .await
        .expect_err("duplicate id must be rejected");
    assert!(matches!(err, StoreError::Duplicate(id) if id == "conf-dup"));

    // The failed create must not have appended a record.
    assert_eq!(store.get_chain("conf-dup").await?.len(), 1);
    Ok(())
}

async fn test_unknown_parent(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let resource = test_resource("conf-orphan", "orphan").with_parent("conf-no-such-parent");
    let err = store
        .create_resource(&resource, create_change(&resource))
        .await
        .expect_err("dangling parent must be rejected on write");
    assert!(matches!(err, StoreError::ForeignKey(_)));
    assert!(store.get_resource("conf-orphan").await?.is_none());
    Ok(())
}

async fn test_children_ordering(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let parent = test_resource("conf-parent", "vpc");
    store.create_resource(&parent, create_change(&parent)).await?;

    for (i, id) in ["conf-child-a", "conf-child-b"].iter().enumerate() {
        let mut child = test_resource(id, id).with_parent("conf-parent");
        // Explicit timestamps make the expected order unambiguous.
        child.created_at += chrono::Duration::seconds(i as i64);
        child.modified_at = child.created_at;
        store.create_resource(&child, create_change(&child)).await?;
    }

    let children = store.get_by_parent("conf-parent").await?;
    assert_eq!(children.len(), 2);
    // Newest first.
    assert_eq!(children[0].id, "conf-child-b");
    assert_eq!(children[1].id, "conf-child-a");
    Ok(())
}

async fn test_update_flow(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let resource = test_resource("conf-update", "web-1");
    let first = store
        .create_resource(&resource, create_change(&resource))
        .await?;

    let mut updated = resource.clone();
    updated.name = "web-1-renamed".to_owned();
    updated
        .data
        .insert("instance_type".into(), "t3.medium".into());
    updated.metadata.modified_by = "bob".to_owned();
    updated.modified_at = updated.created_at + chrono::Duration::seconds(5);
    // The supplied created_at must be ignored in favor of the stored one.
    let original_created_at = resource.created_at;
    updated.created_at = original_created_at + chrono::Duration::days(1);

    let diff = diff_resources(&resource, &updated);
    let second = store
        .update_resource(&updated, NewChange::new(Operation::Update, diff, "bob"))
        .await?;

    let fetched = store.get_resource("conf-update").await?.expect("updated");
    assert_eq!(fetched.name, "web-1-renamed");
    assert_eq!(fetched.created_at, original_created_at);
    assert!(fetched.modified_at > fetched.created_at);

    let chain = store.get_chain("conf-update").await?;
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[1].previous_hash, first.data_hash);
    assert_eq!(chain[1].data_hash, second.data_hash);
    assert!(chain[1].changes.contains_key("name"));
    assert!(chain[1].changes.contains_key("data.instance_type"));
    assert!(verify_chain(&chain).verified);

    let latest = store.latest_record("conf-update").await?.expect("latest");
    assert_eq!(latest.data_hash, second.data_hash);
    Ok(())
}

async fn test_update_missing(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let resource = test_resource("conf-absent", "ghost");
    let err = store
        .update_resource(
            &resource,
            NewChange::new(Operation::Update, Default::default(), "bob"),
        )
        .await
        .expect_err("update of a missing row must fail");
    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(store.get_chain("conf-absent").await?.is_empty());
    Ok(())
}

async fn test_delete_preserves_chain(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let resource = test_resource("conf-delete", "ephemeral");
    store
        .create_resource(&resource, create_change(&resource))
        .await?;
    store
        .delete_resource(
            "conf-delete",
            NewChange::new(Operation::Delete, delete_snapshot(&resource), "carol"),
        )
        .await?;

    assert!(store.get_resource("conf-delete").await?.is_none());

    let chain = store.get_chain("conf-delete").await?;
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[1].operation, Operation::Delete);
    assert_eq!(chain[1].actor, "carol");
    assert!(verify_chain(&chain).verified);

    let err = store
        .delete_resource(
            "conf-delete",
            NewChange::new(Operation::Delete, Default::default(), "carol"),
        )
        .await
        .expect_err("double delete must fail");
    assert!(matches!(err, StoreError::NotFound(_)));
    Ok(())
}

async fn test_recreate_extends_chain(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let resource = test_resource("conf-recreate", "phoenix");
    store
        .create_resource(&resource, create_change(&resource))
        .await?;
    store
        .delete_resource(
            "conf-recreate",
            NewChange::new(Operation::Delete, delete_snapshot(&resource), "alice"),
        )
        .await?;
    store
        .create_resource(&resource, create_change(&resource))
        .await?;

    // Re-creating under the same id continues the historical chain.
    let chain = store.get_chain("conf-recreate").await?;
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[2].operation, Operation::Create);
    assert_eq!(chain[2].previous_hash, chain[1].data_hash);
    assert!(verify_chain(&chain).verified);
    Ok(())
}

async fn test_list_filters(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let aws = test_resource("conf-list-aws", "db-primary").with_metadata(
        ResourceMetadata::new("alice")
            .with_region("us-east-1")
            .with_environment("production")
            .with_cost_center("cc-1")
            .with_tag("team", "storage"),
    );
    let mut gcp = test_resource("conf-list-gcp", "db-replica");
    gcp.provider = CloudProvider::Gcp;
    gcp.resource_type = "gcp.sql.instance".to_owned();
    gcp.metadata = ResourceMetadata::new("alice")
        .with_region("europe-west1")
        .with_environment("staging");

    store.create_resource(&aws, create_change(&aws)).await?;
    store.create_resource(&gcp, create_change(&gcp)).await?;

    let by_provider = store
        .list_resources(&SearchQuery::default().with_provider(CloudProvider::Gcp))
        .await?;
    assert!(by_provider.iter().all(|r| r.provider == CloudProvider::Gcp));
    assert!(by_provider.iter().any(|r| r.id == "conf-list-gcp"));

    let by_type = store
        .list_resources(&SearchQuery::default().with_resource_type("gcp.sql.instance"))
        .await?;
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].id, "conf-list-gcp");

    let by_region = store
        .list_resources(&SearchQuery::default().with_filter("region", "us-east-1"))
        .await?;
    assert!(by_region.iter().any(|r| r.id == "conf-list-aws"));
    assert!(by_region.iter().all(|r| r.metadata.region.as_deref() == Some("us-east-1")));

    let by_env_and_cc = store
        .list_resources(
            &SearchQuery::default()
                .with_filter("environment", "production")
                .with_filter("cost_center", "cc-1"),
        )
        .await?;
    assert_eq!(by_env_and_cc.len(), 1);
    assert_eq!(by_env_and_cc[0].id, "conf-list-aws");

    let by_tag = store
        .list_resources(&SearchQuery::default().with_filter("tag:team", "storage"))
        .await?;
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].id, "conf-list-aws");

    let no_match = store
        .list_resources(&SearchQuery::default().with_filter("tag:team", "networking"))
        .await?;
    assert!(no_match.is_empty());
    Ok(())
}

async fn test_list_sort_and_pagination(store: &dyn InventoryStore) -> Result<(), StoreError> {
    for (i, name) in ["sort-c", "sort-a", "sort-b"].iter().enumerate() {
        let mut r = test_resource(&format!("conf-sort-{i}"), name);
        r.resource_type = "conf.sort.fixture".to_owned();
        r.created_at += chrono::Duration::seconds(i as i64);
        r.modified_at = r.created_at;
        store.create_resource(&r, create_change(&r)).await?;
    }
    let fixture = SearchQuery::default().with_resource_type("conf.sort.fixture");

    let newest_first = store.list_resources(&fixture.clone()).await?;
    let ids: Vec<&str> = newest_first.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["conf-sort-2", "conf-sort-1", "conf-sort-0"]);

    let by_name = store
        .list_resources(&fixture.clone().with_sort(SortBy::Name, SortOrder::Asc))
        .await?;
    let names: Vec<&str> = by_name.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["sort-a", "sort-b", "sort-c"]);

    let paged = store
        .list_resources(
            &fixture
                .clone()
                .with_sort(SortBy::CreatedAt, SortOrder::Asc)
                .with_limit(1)
                .with_offset(1),
        )
        .await?;
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, "conf-sort-1");

    // limit = 0 means an empty result, not an error.
    let empty = store.list_resources(&fixture.with_limit(0)).await?;
    assert!(empty.is_empty());
    Ok(())
}

async fn test_text_search(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let mut resource = test_resource("conf-text", "edge-CACHE-node");
    resource
        .data
        .insert("role".into(), "Memcached Frontend".into());
    store
        .create_resource(&resource, create_change(&resource))
        .await?;

    // Case-insensitive match on the name.
    let by_name = store
        .text_search(&SearchQuery::default().with_text("cache-node"))
        .await?;
    assert!(by_name.iter().any(|r| r.id == "conf-text"));

    // Substring match inside the serialized data payload.
    let by_data = store
        .text_search(&SearchQuery::default().with_text("memcached"))
        .await?;
    assert!(by_data.iter().any(|r| r.id == "conf-text"));

    let none = store
        .text_search(&SearchQuery::default().with_text("no-such-needle-zzz"))
        .await?;
    assert!(none.is_empty());
    Ok(())
}

async fn test_vector_search(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let vectors: [(&str, Option<Vec<f32>>); 4] = [
        ("conf-vec-a", Some(vec![1.0, 0.0, 0.0])),
        ("conf-vec-b", Some(vec![0.9, 0.1, 0.0])),
        ("conf-vec-c", Some(vec![0.0, 1.0, 0.0])),
        ("conf-vec-none", None),
    ];
    for (id, vector) in vectors {
        let mut r = test_resource(id, id);
        r.vector = vector;
        store.create_resource(&r, create_change(&r)).await?;
    }

    let hits = store.vector_search(&[1.0, 0.0, 0.0], 0.5, 10).await?;
    let ids: Vec<&str> = hits.iter().map(|(r, _)| r.id.as_str()).collect();
    assert_eq!(ids, ["conf-vec-a", "conf-vec-b"]);
    // Similarities are non-increasing and strictly above the threshold.
    assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    assert!(hits.iter().all(|(_, s)| *s > 0.5));
    assert!((hits[0].1 - 1.0).abs() < 1e-5);

    let capped = store.vector_search(&[1.0, 0.0, 0.0], 0.5, 1).await?;
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].0.id, "conf-vec-a");

    // A vector-less resource is invisible here but visible to lists.
    let all_hits = store.vector_search(&[1.0, 0.0, 0.0], -1.0, 100).await?;
    assert!(all_hits.iter().all(|(r, _)| r.id != "conf-vec-none"));
    let listed = store
        .list_resources(&SearchQuery::default().with_limit(1000))
        .await?;
    assert!(listed.iter().any(|r| r.id == "conf-vec-none"));
    Ok(())
}

async fn test_vector_dimension_check(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let err = store
        .vector_search(&[1.0, 0.0], 0.0, 10)
        .await
        .expect_err("query vector of the wrong width must be rejected");
    assert!(matches!(
        err,
        StoreError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
    ));

    let mut resource = test_resource("conf-vec-wide", "wide");
    resource.vector = Some(vec![0.0; 5]);
    let err = store
        .create_resource(&resource, create_change(&resource))
        .await
        .expect_err("stored vector of the wrong width must be rejected");
    assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    Ok(())
}

async fn test_schema_crud(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let schema_map = serde_json::json!({
        "required": ["endpoint"],
        "properties": {"endpoint": {"type": "string"}}
    })
    .as_object()
    .cloned()
    .unwrap_or_default();
    let schema = ResourceSchema::new("app", CloudProvider::Custom, "custom.app", schema_map)
        .with_description("application descriptor");

    store.put_schema(&schema).await?;
    let fetched = store
        .get_schema("app", CloudProvider::Custom)
        .await?
        .expect("stored schema");
    assert_eq!(fetched.version, 1);
    assert_eq!(fetched.description, "application descriptor");

    // Upsert on (name, provider) replaces the stored version.
    let v2 = schema.clone().with_version(2);
    store.put_schema(&v2).await?;
    let fetched = store
        .get_schema("app", CloudProvider::Custom)
        .await?
        .expect("upserted schema");
    assert_eq!(fetched.version, 2);

    // Same name under a different provider is a distinct identity.
    let mut other = schema.clone();
    other.provider = CloudProvider::Aws;
    store.put_schema(&other).await?;
    assert!(store.get_schema("app", CloudProvider::Aws).await?.is_some());

    let all = store.list_schemas().await?;
    assert!(all.len() >= 2);

    assert!(store.delete_schema("app", CloudProvider::Aws).await?);
    assert!(!store.delete_schema("app", CloudProvider::Aws).await?);
    assert!(store.get_schema("app", CloudProvider::Aws).await?.is_none());
    Ok(())
}

async fn test_terraform_crud(store: &dyn InventoryStore) -> Result<(), StoreError> {
    let key = TerraformKey::new("prod/network/vpc", "prod/network").with_data(
        serde_json::json!({"cidr": "10.0.0.0/16"})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    );
    store.put_terraform_key(&key).await?;
    store
        .put_terraform_key(&TerraformKey::new("prod/compute/asg", "prod/compute"))
        .await?;
    store
        .put_terraform_key(&TerraformKey::new("stage/network/vpc", "stage/network"))
        .await?;

    let fetched = store
        .get_terraform_key("prod/network/vpc")
        .await?
        .expect("stored key");
    assert_eq!(fetched.data["cidr"], "10.0.0.0/16");

    let prod = store.list_terraform_keys("prod/").await?;
    let keys: Vec<&str> = prod.iter().map(|k| k.key.as_str()).collect();
    assert_eq!(keys, ["prod/compute/asg", "prod/network/vpc"]);

    // Overwrite refreshes updated_at but keeps created_at.
    let mut rewritten = TerraformKey::new("prod/network/vpc", "prod/network");
    rewritten.updated_at = fetched.updated_at + chrono::Duration::seconds(10);
    store.put_terraform_key(&rewritten).await?;
    let after = store
        .get_terraform_key("prod/network/vpc")
        .await?
        .expect("rewritten key");
    assert_eq!(after.created_at, fetched.created_at);
    assert!(after.updated_at > fetched.updated_at);

    assert!(store.delete_terraform_key("stage/network/vpc").await?);
    assert!(!store.delete_terraform_key("stage/network/vpc").await?);
    Ok(())
}
