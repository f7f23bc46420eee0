use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::settings::{EmbeddingConfig, EmbeddingModelCandidate};
use crate::utils::ApiError;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
    fn dimension(&self) -> usize;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponseItem {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedResponseItem>,
}

/// Probes an ordered list of candidate embedding endpoints at startup and
/// latches onto the first that answers a test encode, mirroring the
/// three-tier fallback the prior system used for its sentence-embedding models.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HttpEmbedder {
    pub async fn probe(cfg: &EmbeddingConfig) -> anyhow::Result<Arc<Self>> {
        let client = reqwest::Client::new();

        for candidate in &cfg.models {
            match Self::try_candidate(&client, candidate).await {
                Ok(dimension) => {
                    info!(model = %candidate.name, dimension, "embedding model latched");
                    return Ok(Arc::new(Self {
                        client,
                        base_url: candidate.base_url.clone(),
                        model: candidate.name.clone(),
                        dimension,
                        batch_size: cfg.batch_size.max(1),
                    }));
                }
                Err(e) => {
                    warn!(model = %candidate.name, error = %e, "embedding candidate unavailable");
                }
            }
        }

        anyhow::bail!("no embedding model candidate responded; exhausted {} candidates", cfg.models.len())
    }

    async fn try_candidate(
        client: &reqwest::Client,
        candidate: &EmbeddingModelCandidate,
    ) -> anyhow::Result<usize> {
        let probe_text = vec!["ping".to_string()];
        let body = EmbedRequest {
            model: &candidate.name,
            input: &probe_text,
        };

        let resp = client
            .post(format!("{}/embeddings", candidate.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;

        let dim = resp
            .data
            .first()
            .map(|d| d.embedding.len())
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))?;

        Ok(dim)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let body = EmbedRequest {
                model: &self.model,
                input: batch,
            };

            let resp = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .json(&body)
                .send()
                .await
                .map_err(|e| ApiError::Upstream(format!("embedding request failed: {e}")))?
                .error_for_status()
                .map_err(|e| ApiError::Upstream(format!("embedding server error: {e}")))?
                .json::<EmbedResponse>()
                .await
                .map_err(|e| ApiError::Upstream(format!("embedding response decode failed: {e}")))?;

            for item in resp.data {
                if item.embedding.len() != self.dimension {
                    return Err(ApiError::Upstream(format!(
                        "embedding dimension drift: expected {}, got {}",
                        self.dimension,
                        item.embedding.len()
                    )));
                }
                out.push(item.embedding);
            }
        }

        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_request_serializes_model_and_input() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let req = EmbedRequest {
            model: "test-model",
            input: &texts,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("test-model"));
        assert!(json.contains("\"a\""));
    }
}
