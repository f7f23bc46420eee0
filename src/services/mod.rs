pub mod answerer;
pub mod embedding;
pub mod ingestion;
pub mod llm;
pub mod natural_language;
pub mod reranker;

pub use answerer::{AnswerResponse, Answerer};
pub use embedding::{Embedder, HttpEmbedder};
pub use ingestion::{IngestionCoordinator, IngestionSummary, UploadFile};
pub use llm::{HttpLlmClient, LlmClient};
pub use natural_language::NaturalLanguageFilter;
pub use reranker::{HttpReranker, Reranker};
