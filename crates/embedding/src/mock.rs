use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::provider::Embedder;

/// A mock embedder that always returns the same fixed vector.
///
/// Tracks the number of calls via an atomic counter so tests can verify
/// caching and re-embed behaviour.
pub struct MockEmbedder {
    vector: Vec<f32>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    /// Create a mock embedder returning the given fixed vector.
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times [`embed`](Embedder::embed) was called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// A mock embedder that maps specific texts to specific vectors.
///
/// Unknown texts receive a zero vector of the configured dimension.
pub struct MappingEmbedder {
    mappings: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl MappingEmbedder {
    /// Create a mapping embedder with the given text-to-vector mappings.
    pub fn new(mappings: HashMap<String, Vec<f32>>, dimension: usize) -> Self {
        Self {
            mappings,
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for MappingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .mappings
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.dimension]))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// A mock embedder that always returns an error.
pub struct FailingEmbedder {
    dimension: usize,
}

impl FailingEmbedder {
    /// Create a failing embedder reporting the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::ApiError("mock failure".to_owned()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_fixed_vector() {
        let provider = MockEmbedder::new(vec![1.0, 2.0, 3.0]);
        let result = provider.embed("anything").await.unwrap();
        assert_eq!(result, vec![1.0, 2.0, 3.0]);
        assert_eq!(provider.dimension(), 3);
    }

    #[tokio::test]
    async fn mock_tracks_call_count() {
        let provider = MockEmbedder::new(vec![1.0]);
        assert_eq!(provider.call_count(), 0);
        provider.embed("a").await.unwrap();
        provider.embed("b").await.unwrap();
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn mapping_returns_known_vector() {
        let mut mappings = HashMap::new();
        mappings.insert("hello".to_owned(), vec![0.5, 0.5]);
        let provider = MappingEmbedder::new(mappings, 2);

        let result = provider.embed("hello").await.unwrap();
        assert_eq!(result, vec![0.5, 0.5]);

        let result = provider.embed("unknown").await.unwrap();
        assert_eq!(result, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn failing_always_errors() {
        let provider = FailingEmbedder::new(3);
        assert!(provider.embed("anything").await.is_err());
        assert_eq!(provider.dimension(), 3);
    }

    #[tokio::test]
    async fn batch_defaults_to_sequential() {
        let provider = MockEmbedder::new(vec![1.0]);
        let vectors = provider.embed_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(provider.call_count(), 3);
    }
}
