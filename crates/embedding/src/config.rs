use serde::Deserialize;

/// Configuration for an HTTP-based embedder.
#[derive(Clone, Deserialize)]
pub struct EmbedderConfig {
    /// The API endpoint (e.g. `https://api.openai.com/v1/embeddings`).
    pub endpoint: String,
    /// The model name (e.g. `text-embedding-3-small`).
    pub model: String,
    /// API key for authentication. Redacted in `Debug`.
    pub api_key: String,
    /// The vector width the model produces. Must match the store's
    /// configured dimension.
    pub dimension: usize,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for EmbedderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedderConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("dimension", &self.dimension)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Configuration for the embedding cache.
///
/// Each cached embedding is a `Vec<f32>` of the model dimension; at 1536
/// floats one vector is ~6 KB, so the default capacity is worth ~60 MB.
#[derive(Debug, Clone, Copy)]
pub struct EmbedderCacheConfig {
    /// Maximum number of embeddings to cache.
    pub capacity: u64,
    /// TTL in seconds for cached embeddings.
    pub ttl_seconds: u64,
}

impl Default for EmbedderCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_seconds: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let config = EmbedderConfig {
            endpoint: "https://api.openai.com/v1/embeddings".into(),
            model: "text-embedding-3-small".into(),
            api_key: "sk-secret".into(),
            dimension: 1536,
            timeout_seconds: 10,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn cache_defaults() {
        let config = EmbedderCacheConfig::default();
        assert_eq!(config.capacity, 10_000);
        assert_eq!(config.ttl_seconds, 3600);
    }
}
