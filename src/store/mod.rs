pub mod snapshot;
pub mod vector_store;

pub use vector_store::{ChunkMetadata, SearchResult, StoreStats, VectorStore};
