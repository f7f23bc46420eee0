use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::settings::RerankerConfig;
use crate::store::SearchResult;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorders `docs` by relevance to `query`, truncated to `top_k`.
    /// Never fails the caller: on any scoring trouble it degrades to the
    /// first `top_k` documents unchanged.
    async fn rerank(&self, query: &str, docs: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult>;
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct RerankResponseItem {
    index: usize,
    score: f32,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResponseItem>,
}

pub struct HttpReranker {
    client: reqwest::Client,
    base_url: String,
    model: String,
    enabled: bool,
}

impl HttpReranker {
    pub fn new(cfg: &RerankerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            enabled: cfg.enabled,
        }
    }

    async fn score(&self, query: &str, docs: &[SearchResult]) -> anyhow::Result<Vec<(usize, f32)>> {
        let texts: Vec<String> = docs.iter().map(|d| d.metadata.text.clone()).collect();
        let body = RerankRequest {
            query,
            documents: &texts,
            model: &self.model,
        };

        let resp = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<RerankResponse>()
            .await?;

        Ok(resp.results.into_iter().map(|r| (r.index, r.score)).collect())
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, docs: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
        if !self.enabled || docs.is_empty() {
            docs.into_iter().take(top_k).collect()
        } else {
            match self.score(query, &docs).await {
                Ok(mut scored) => {
                    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                    scored
                        .into_iter()
                        .take(top_k)
                        .filter_map(|(idx, score)| {
                            docs.get(idx).cloned().map(|mut d| {
                                d.score = score;
                                d
                            })
                        })
                        .collect()
                }
                Err(e) => {
                    warn!(error = %e, "reranker call failed, degrading to unranked order");
                    docs.into_iter().take(top_k).collect()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChunkMetadata;

    fn doc(text: &str) -> SearchResult {
        SearchResult {
            metadata: ChunkMetadata {
                filename: "a.pdf".to_string(),
                user_id: 1,
                page_number: 1,
                chunk_id: 0,
                text: text.to_string(),
            },
            score: 1.0,
        }
    }

    #[tokio::test]
    async fn disabled_reranker_degrades_to_truncation() {
        let reranker = HttpReranker {
            client: reqwest::Client::new(),
            base_url: "http://unused".to_string(),
            model: "unused".to_string(),
            enabled: false,
        };
        let docs = vec![doc("one"), doc("two"), doc("three")];
        let result = reranker.rerank("query", docs, 2).await;
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].metadata.text, "one");
    }
}
