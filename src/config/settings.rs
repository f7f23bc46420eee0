use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub database: DatabaseConfig,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub reranker: RerankerConfig,
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Random secret used only to sign the session cookie's integrity, never
    /// embedded as session state (sessions stay server-side, see AuthSession).
    pub cookie_secret: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

/// One candidate embedding model, tried in order at startup.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingModelCandidate {
    pub name: String,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub models: Vec<EmbeddingModelCandidate>,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VectorStoreConfig {
    pub index_path: String,
    pub metadata_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RerankerConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub fallback_models: Vec<String>,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    pub retry_max_tokens: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RagConfig {
    pub search_top_k: usize,
    pub adjacency_page_range: i32,
    pub rerank_top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitsConfig {
    pub ingestion_concurrency: usize,
    pub embedding_concurrency: usize,
    pub llm_generate_concurrency: usize,
    pub acquire_timeout_ms: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
