//! PostgreSQL inventory store backend.
//!
//! Persists resources with their embedding vectors (via the `pgvector`
//! extension), the per-resource audit chains, schemas, and terraform keys.
//! Every mutation runs in one transaction spanning the row change and the
//! chain append; the target row is locked with `SELECT ... FOR UPDATE`
//! before the latest record is read, so same-resource appends serialize.

pub mod config;
pub mod migrations;
pub mod store;

pub use config::PostgresStoreConfig;
pub use store::PostgresStore;
