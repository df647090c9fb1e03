use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedderConfig;
use crate::error::EmbeddingError;
use crate::provider::Embedder;

/// An embedder that calls an OpenAI-compatible `/v1/embeddings` API.
///
/// Requests are batched natively: scan ingestion produces many resource
/// texts at once, and one round trip embeds the whole batch. Single-text
/// embeds go through the same path with a one-element batch.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimension: usize,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder from the given configuration.
    pub fn new(config: EmbedderConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EmbeddingError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
            model: config.model,
            api_key: config.api_key,
            dimension: config.dimension,
        })
    }

    /// One authenticated round trip for a batch of inputs. Returns vectors
    /// in input order and rejects any vector whose width does not match
    /// the configured dimension.
    async fn request_embeddings(
        &self,
        inputs: &[&str],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        debug!(model = %self.model, batch = inputs.len(), "requesting embeddings");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".to_owned());
            return Err(EmbeddingError::ApiError(format!("status {status}: {body}")));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ParseError(e.to_string()))?;

        if parsed.data.len() != inputs.len() {
            return Err(EmbeddingError::ParseError(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }
        // The API is allowed to return entries out of order; the index
        // field is authoritative for pairing vectors with inputs.
        parsed.data.sort_by_key(|entry| entry.index);

        let mut vectors = Vec::with_capacity(parsed.data.len());
        for entry in parsed.data {
            if entry.embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.embedding.len(),
                });
            }
            vectors.push(entry.embedding);
        }
        Ok(vectors)
    }
}

/// Embeddings API request body.
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

/// Embeddings API response.
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

/// One embedding in the response, paired with its input position.
#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.request_embeddings(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::ParseError("empty response data".to_owned()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_a_batch() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &["provider: aws", "provider: gcp"],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"model":"text-embedding-3-small","input":["provider: aws","provider: gcp"]}"#
        );
    }

    #[test]
    fn response_entries_pair_by_index() {
        let mut parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]}"#,
        )
        .unwrap();
        parsed.data.sort_by_key(|entry| entry.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0, 0.0]);
        assert_eq!(parsed.data[1].embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn response_ignores_extra_fields() {
        let parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"index":0,"embedding":[0.5],"object":"embedding"}],"model":"m","usage":{"total_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(parsed.data.len(), 1);
    }
}
