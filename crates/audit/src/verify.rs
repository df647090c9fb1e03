use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::hash::compute_data_hash;
use crate::record::ChangeRecord;
use crate::signer::verify_signature;

/// Result of walking a resource's chain from the earliest record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Whether every link and every recomputed hash checked out.
    pub verified: bool,

    /// Number of records examined.
    pub chain_length: usize,

    /// Index of the first record that failed a check, when any did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_inconsistency_index: Option<usize>,
}

impl ChainVerification {
    fn ok(chain_length: usize) -> Self {
        Self {
            verified: true,
            chain_length,
            first_inconsistency_index: None,
        }
    }

    fn broken(chain_length: usize, index: usize) -> Self {
        Self {
            verified: false,
            chain_length,
            first_inconsistency_index: Some(index),
        }
    }
}

/// Verify a chain's linkage and hash integrity.
///
/// `records` must be in timestamp-ascending order (the order store backends
/// return chains in). Checks that the first record's `previous_hash` is
/// empty, that every later record links to its predecessor's `data_hash`,
/// and that every `data_hash` matches recomputation over the record's
/// canonical content. Signatures are not checked here; use
/// [`verify_chain_with_key`] when a verifying key is available.
pub fn verify_chain(records: &[ChangeRecord]) -> ChainVerification {
    verify_inner(records, None)
}

/// Verify a chain including signature checks against the given key.
///
/// Unsigned records (empty `signature`) fail verification under a key: a
/// signer was expected for every append.
pub fn verify_chain_with_key(records: &[ChangeRecord], key: &VerifyingKey) -> ChainVerification {
    verify_inner(records, Some(key))
}

fn verify_inner(records: &[ChangeRecord], key: Option<&VerifyingKey>) -> ChainVerification {
    let mut previous_hash = "";
    for (index, record) in records.iter().enumerate() {
        if record.previous_hash != previous_hash {
            return ChainVerification::broken(records.len(), index);
        }

        let recomputed = compute_data_hash(
            &record.resource_id,
            record.operation,
            &record.changes,
            &record.timestamp,
            &record.actor,
            &record.previous_hash,
        );
        if recomputed != record.data_hash {
            return ChainVerification::broken(records.len(), index);
        }

        if let Some(key) = key {
            let signed = !record.signature.is_empty()
                && verify_signature(key, &record.data_hash, &record.signature).unwrap_or(false);
            if !signed {
                return ChainVerification::broken(records.len(), index);
            }
        }

        previous_hash = &record.data_hash;
    }

    ChainVerification::ok(records.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::appender::ChainAppender;
    use crate::record::Operation;
    use crate::signer::Ed25519Signer;
    use stratus_core::{ChangeSet, FieldChange};

    fn build_chain(appender: &ChainAppender, length: usize) -> Vec<ChangeRecord> {
        let mut records: Vec<ChangeRecord> = Vec::with_capacity(length);
        for i in 0..length {
            let previous = records.last().map_or("", |r: &ChangeRecord| &r.data_hash);
            let operation = if i == 0 {
                Operation::Create
            } else {
                Operation::Update
            };
            let mut changes = ChangeSet::new();
            changes.insert(format!("step{i}"), FieldChange::new(i as u64, (i + 1) as u64));
            records.push(
                appender
                    .next_record("r1", operation, changes, "alice", previous)
                    .unwrap(),
            );
        }
        records
    }

    #[test]
    fn empty_chain_verifies() {
        let verification = verify_chain(&[]);
        assert!(verification.verified);
        assert_eq!(verification.chain_length, 0);
    }

    #[test]
    fn well_formed_chain_verifies() {
        let chain = build_chain(&ChainAppender::new(), 4);
        let verification = verify_chain(&chain);
        assert!(verification.verified);
        assert_eq!(verification.chain_length, 4);
        assert!(verification.first_inconsistency_index.is_none());
    }

    #[test]
    fn tampered_changes_break_at_that_index() {
        let mut chain = build_chain(&ChainAppender::new(), 3);
        chain[1]
            .changes
            .insert("injected".to_owned(), FieldChange::new("a", "b"));

        let verification = verify_chain(&chain);
        assert!(!verification.verified);
        assert_eq!(verification.first_inconsistency_index, Some(1));
    }

    #[test]
    fn broken_linkage_is_detected() {
        let appender = ChainAppender::new();
        let first = appender
            .next_record("r1", Operation::Create, ChangeSet::new(), "alice", "")
            .unwrap();
        // A fork: second record built against an unrelated tip.
        let second = appender
            .next_record("r1", Operation::Update, ChangeSet::new(), "bob", "bogus")
            .unwrap();

        let verification = verify_chain(&[first, second]);
        assert!(!verification.verified);
        assert_eq!(verification.first_inconsistency_index, Some(1));
    }

    #[test]
    fn nonempty_first_previous_hash_is_broken_at_zero() {
        let appender = ChainAppender::new();
        let record = appender
            .next_record("r1", Operation::Create, ChangeSet::new(), "alice", "tip")
            .unwrap();
        let verification = verify_chain(&[record]);
        assert!(!verification.verified);
        assert_eq!(verification.first_inconsistency_index, Some(0));
    }

    #[test]
    fn signed_chain_verifies_with_key() {
        let signer = Arc::new(Ed25519Signer::generate());
        let key = signer.verifying_key();
        let chain = build_chain(&ChainAppender::with_signer(signer), 3);

        assert!(verify_chain_with_key(&chain, &key).verified);
    }

    #[test]
    fn unsigned_record_fails_under_key() {
        let signer = Arc::new(Ed25519Signer::generate());
        let key = signer.verifying_key();
        let chain = build_chain(&ChainAppender::new(), 2);

        let verification = verify_chain_with_key(&chain, &key);
        assert!(!verification.verified);
        assert_eq!(verification.first_inconsistency_index, Some(0));
        // Without the key requirement the same chain is fine.
        assert!(verify_chain(&chain).verified);
    }
}
