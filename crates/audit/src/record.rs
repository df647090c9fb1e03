use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stratus_core::ChangeSet;

/// The lifecycle transition an audit record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// The resource was inserted.
    Create,
    /// The resource row was replaced.
    Update,
    /// The resource row was removed (the chain is retained).
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => f.write_str("CREATE"),
            Self::Update => f.write_str("UPDATE"),
            Self::Delete => f.write_str("DELETE"),
        }
    }
}

/// One entry of a per-resource audit chain.
///
/// For any resource the records form a strict chain ordered by `timestamp`:
/// each record's `previous_hash` equals the prior record's `data_hash`, and
/// the first record's `previous_hash` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Unique record id (UUID v4, 16 random bytes).
    pub id: String,

    /// The resource this record belongs to.
    pub resource_id: String,

    /// Which lifecycle transition happened.
    pub operation: Operation,

    /// Structural diff for UPDATE, full snapshot for CREATE, final snapshot
    /// for DELETE.
    pub changes: ChangeSet,

    /// When the transition was recorded.
    pub timestamp: DateTime<Utc>,

    /// Who performed the transition.
    pub actor: String,

    /// `data_hash` of the immediately prior record for the same resource,
    /// or empty for the first record.
    #[serde(default)]
    pub previous_hash: String,

    /// SHA-256 hex digest over the canonical serialization of
    /// `(resource_id, operation, changes, timestamp, actor, previous_hash)`.
    pub data_hash: String,

    /// Optional authenticator of `data_hash`; empty when no signer is
    /// configured.
    #[serde(default)]
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&Operation::Create).unwrap(),
            r#""CREATE""#
        );
        let back: Operation = serde_json::from_str(r#""DELETE""#).unwrap();
        assert_eq!(back, Operation::Delete);
    }

    #[test]
    fn operation_display() {
        assert_eq!(Operation::Update.to_string(), "UPDATE");
    }

    #[test]
    fn record_serde_roundtrip() {
        let record = ChangeRecord {
            id: "rec-1".into(),
            resource_id: "r1".into(),
            operation: Operation::Create,
            changes: ChangeSet::new(),
            timestamp: Utc::now(),
            actor: "alice".into(),
            previous_hash: String::new(),
            data_hash: "abc123".into(),
            signature: String::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ChangeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
