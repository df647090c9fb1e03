pub mod appender;
pub mod error;
pub mod hash;
pub mod record;
pub mod signer;
pub mod verify;

pub use appender::ChainAppender;
pub use error::AuditError;
pub use hash::compute_data_hash;
pub use record::{ChangeRecord, Operation};
pub use signer::{Ed25519Signer, RecordSigner, verify_signature};
pub use verify::{ChainVerification, verify_chain, verify_chain_with_key};
