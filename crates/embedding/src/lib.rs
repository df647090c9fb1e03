pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod provider;
pub mod text;

pub use cache::CachedEmbedder;
pub use config::{EmbedderCacheConfig, EmbedderConfig};
pub use error::EmbeddingError;
pub use http::HttpEmbedder;
pub use mock::{FailingEmbedder, MappingEmbedder, MockEmbedder};
pub use provider::Embedder;
pub use text::resource_embedding_text;
