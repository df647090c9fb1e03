pub mod canonical;
pub mod diff;
pub mod error;
pub mod provider;
pub mod query;
pub mod resource;
pub mod schema;
pub mod terraform;
pub mod update;

pub use canonical::{canonical_json, canonical_timestamp};
pub use diff::{ChangeSet, FieldChange, create_snapshot, delete_snapshot, diff_resources};
pub use error::{ValidationError, ValidationReason};
pub use provider::CloudProvider;
pub use query::{DEFAULT_LIMIT, MAX_LIMIT, SearchQuery, SortBy, SortOrder};
pub use resource::{Resource, ResourceMetadata};
pub use schema::{ResourceSchema, validate_data};
pub use terraform::TerraformKey;
pub use update::{MetadataPatch, UpdateResourceRequest, apply_metadata_patch, apply_update};
