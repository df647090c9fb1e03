use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Capability for computing text embeddings.
///
/// Implementations call an external service (e.g. an OpenAI-compatible API)
/// to convert text into a dense vector of a fixed width. Identical inputs
/// must produce identical vectors within one model version.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector of
    /// [`dimension`](Self::dimension) floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// The fixed width of vectors this embedder produces. Must match the
    /// store's configured dimension.
    fn dimension(&self) -> usize;

    /// Embed multiple texts in a single batch.
    ///
    /// The default implementation calls [`embed`](Self::embed) sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}
