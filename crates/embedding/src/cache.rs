use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::config::EmbedderCacheConfig;
use crate::error::EmbeddingError;
use crate::provider::Embedder;

/// A bounded, TTL-based embedding cache backed by [`moka`].
///
/// Wraps any inner [`Embedder`]. Uses `try_get_with` to coalesce concurrent
/// requests for the same text (thundering herd protection), which matters
/// during scan ingestion where many identical provider payloads arrive at
/// once.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Cache<String, Vec<f32>>,
}

impl CachedEmbedder {
    /// Create a cache in front of the given embedder.
    pub fn new(inner: Arc<dyn Embedder>, config: EmbedderCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();
        Self { inner, cache }
    }
}

impl std::fmt::Debug for CachedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbedder")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let inner = Arc::clone(&self.inner);
        let key = text.to_owned();
        self.cache
            .try_get_with(key, async move { inner.embed(text).await })
            .await
            .map_err(|e| EmbeddingError::ApiError(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbedder;

    #[tokio::test]
    async fn caches_embeddings() {
        let provider = Arc::new(MockEmbedder::new(vec![0.1, 0.2, 0.3]));
        let cache = CachedEmbedder::new(
            Arc::clone(&provider) as _,
            EmbedderCacheConfig::default(),
        );

        let first = cache.embed("aws ec2 web-1").await.unwrap();
        let second = cache.embed("aws ec2 web-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn different_keys_call_provider() {
        let provider = Arc::new(MockEmbedder::new(vec![1.0]));
        let cache = CachedEmbedder::new(
            Arc::clone(&provider) as _,
            EmbedderCacheConfig::default(),
        );

        cache.embed("a").await.unwrap();
        cache.embed("b").await.unwrap();
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn dimension_delegates_to_inner() {
        let provider = Arc::new(MockEmbedder::new(vec![0.0; 3]));
        let cache = CachedEmbedder::new(
            Arc::clone(&provider) as _,
            EmbedderCacheConfig::default(),
        );
        assert_eq!(cache.dimension(), 3);
    }
}
