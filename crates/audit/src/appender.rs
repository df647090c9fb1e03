use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use stratus_core::ChangeSet;

use crate::error::AuditError;
use crate::hash::compute_data_hash;
use crate::record::{ChangeRecord, Operation};
use crate::signer::RecordSigner;

/// Builds the next record of a resource's chain.
///
/// Store backends call [`next_record`](Self::next_record) inside their write
/// transaction, after resolving `previous_hash` under the per-resource lock,
/// so concurrent appends for one resource serialize into a fork-free chain.
#[derive(Clone, Default)]
pub struct ChainAppender {
    signer: Option<Arc<dyn RecordSigner>>,
}

impl std::fmt::Debug for ChainAppender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainAppender")
            .field("signer", &self.signer.is_some())
            .finish()
    }
}

impl ChainAppender {
    /// An appender that leaves signatures empty.
    #[must_use]
    pub fn new() -> Self {
        Self { signer: None }
    }

    /// An appender that signs every record hash.
    #[must_use]
    pub fn with_signer(signer: Arc<dyn RecordSigner>) -> Self {
        Self {
            signer: Some(signer),
        }
    }

    /// Build the record that extends the chain whose tip hash is
    /// `previous_hash` (empty for a new chain). Generates the record id
    /// from 16 random bytes and stamps the current instant.
    pub fn next_record(
        &self,
        resource_id: &str,
        operation: Operation,
        changes: ChangeSet,
        actor: &str,
        previous_hash: &str,
    ) -> Result<ChangeRecord, AuditError> {
        let timestamp = Utc::now();
        let data_hash = compute_data_hash(
            resource_id,
            operation,
            &changes,
            &timestamp,
            actor,
            previous_hash,
        );
        let signature = match &self.signer {
            Some(signer) => signer.sign(&data_hash)?,
            None => String::new(),
        };

        Ok(ChangeRecord {
            id: Uuid::new_v4().to_string(),
            resource_id: resource_id.to_owned(),
            operation,
            changes,
            timestamp,
            actor: actor.to_owned(),
            previous_hash: previous_hash.to_owned(),
            data_hash,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{Ed25519Signer, verify_signature};
    use crate::verify::verify_chain;

    #[test]
    fn first_record_has_empty_previous_hash() {
        let appender = ChainAppender::new();
        let record = appender
            .next_record("r1", Operation::Create, ChangeSet::new(), "alice", "")
            .unwrap();
        assert_eq!(record.previous_hash, "");
        assert_eq!(record.signature, "");
        assert_eq!(record.actor, "alice");
        assert!(!record.data_hash.is_empty());
    }

    #[test]
    fn records_chain_through_data_hash() {
        let appender = ChainAppender::new();
        let first = appender
            .next_record("r1", Operation::Create, ChangeSet::new(), "alice", "")
            .unwrap();
        let second = appender
            .next_record(
                "r1",
                Operation::Update,
                ChangeSet::new(),
                "bob",
                &first.data_hash,
            )
            .unwrap();

        assert_eq!(second.previous_hash, first.data_hash);
        let verification = verify_chain(&[first, second]);
        assert!(verification.verified);
        assert_eq!(verification.chain_length, 2);
    }

    #[test]
    fn record_ids_are_unique() {
        let appender = ChainAppender::new();
        let a = appender
            .next_record("r1", Operation::Create, ChangeSet::new(), "alice", "")
            .unwrap();
        let b = appender
            .next_record("r2", Operation::Create, ChangeSet::new(), "alice", "")
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn configured_signer_signs_the_hash() {
        let signer = Arc::new(Ed25519Signer::generate());
        let key = signer.verifying_key();
        let appender = ChainAppender::with_signer(signer);

        let record = appender
            .next_record("r1", Operation::Create, ChangeSet::new(), "alice", "")
            .unwrap();
        assert!(!record.signature.is_empty());
        assert!(verify_signature(&key, &record.data_hash, &record.signature).unwrap());
    }
}
