use std::sync::Arc;

use crate::config::Settings;
use crate::database::{DbPool, Repository};
use crate::services::{Answerer, Embedder, IngestionCoordinator, LlmClient, Reranker};
use crate::store::VectorStore;
use crate::utils::Limiters;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub repository: Arc<Repository>,
    pub store: Arc<VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub reranker: Arc<dyn Reranker>,
    pub llm: Arc<dyn LlmClient>,
    pub answerer: Arc<Answerer>,
    pub ingestion: Arc<IngestionCoordinator>,
    pub settings: Settings,
    pub limiters: Arc<Limiters>,
}
