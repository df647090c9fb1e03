use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use stratus_core::{ChangeSet, canonical_json, canonical_timestamp};

use crate::record::Operation;

/// Compute the SHA-256 hex digest of a record's content tuple.
///
/// The input is the canonical JSON of
/// `{resource_id, operation, changes, timestamp, actor, previous_hash}`,
/// with object keys sorted and the timestamp rendered at nanosecond
/// precision, so recomputation is byte-stable across processes.
pub fn compute_data_hash(
    resource_id: &str,
    operation: Operation,
    changes: &ChangeSet,
    timestamp: &DateTime<Utc>,
    actor: &str,
    previous_hash: &str,
) -> String {
    let tuple = serde_json::json!({
        "resource_id": resource_id,
        "operation": operation.to_string(),
        "changes": changes,
        "timestamp": canonical_timestamp(timestamp),
        "actor": actor,
        "previous_hash": previous_hash,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&tuple).as_bytes());
    hex::encode(hasher.finalize())
}
