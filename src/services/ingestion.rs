use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::database::Repository;
use crate::document::{Chunker, DocumentParser, ExtractionStatus};
use crate::services::embedding::Embedder;
use crate::store::{ChunkMetadata, VectorStore};
use crate::utils::{ApiError, Limiters};

pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct FileIngestOutcome {
    pub filename: String,
    pub page_count: i32,
    pub chunk_count: i32,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestionSummary {
    pub files: Vec<FileIngestOutcome>,
}

pub struct IngestionCoordinator {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    repository: Arc<Repository>,
    chunker: Chunker,
    limiters: Arc<Limiters>,
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        repository: Arc<Repository>,
        chunk_size: usize,
        chunk_overlap: usize,
        limiters: Arc<Limiters>,
    ) -> Self {
        Self {
            store,
            embedder,
            repository,
            chunker: Chunker::new(chunk_size, chunk_overlap),
            limiters,
        }
    }

    pub async fn ingest(&self, user_id: i64, files: Vec<UploadFile>) -> Result<IngestionSummary, ApiError> {
        let (_permit, waited) = Limiters::acquire_timed(
            self.limiters.ingestion.clone(),
            self.limiters.acquire_timeout,
            "ingestion",
        )
        .await
        .map_err(|e| ApiError::Timeout(e.to_string()))?;
        if waited.as_millis() > 0 {
            tracing::debug!(waited_ms = waited.as_millis(), "ingestion request queued for a permit");
        }

        let mut valid_filenames: Vec<String> = self
            .repository
            .get_user_files(user_id)
            .await?
            .into_iter()
            .map(|f| f.filename)
            .collect();
        for file in &files {
            if !valid_filenames.contains(&file.filename) {
                valid_filenames.push(file.filename.clone());
            }
        }

        let purged = self
            .store
            .delete_temp_files_by_user(user_id, Some(&valid_filenames), self.embedder.as_ref())
            .await?;
        if purged > 0 {
            info!(purged, user_id, "purged stale temp-named chunks before ingestion");
        }

        // Displace any chunks from a prior upload with the same filename
        // before parsing the new bytes, so a re-upload fully replaces rather
        // than appends to a file's chunks.
        for file in &files {
            self.store
                .delete_by_filename(&file.filename, user_id, self.embedder.as_ref())
                .await?;
        }

        let mut outcomes = Vec::with_capacity(files.len());
        let mut all_texts: Vec<String> = Vec::new();
        let mut all_metadata: Vec<ChunkMetadata> = Vec::new();
        let mut per_file_chunk_counts: Vec<(String, i32, i32)> = Vec::new();

        for file in files {
            match self.process_one(user_id, &file) {
                Ok((page_count, metas, texts)) => {
                    let chunk_count = metas.len() as i32;
                    per_file_chunk_counts.push((file.filename.clone(), page_count, chunk_count));
                    all_metadata.extend(metas);
                    all_texts.extend(texts);
                    outcomes.push(FileIngestOutcome {
                        filename: file.filename,
                        page_count,
                        chunk_count,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(filename = %file.filename, error = %e, "file ingestion failed");
                    outcomes.push(FileIngestOutcome {
                        filename: file.filename,
                        page_count: 0,
                        chunk_count: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if !all_texts.is_empty() {
            let vectors = self.embedder.encode(&all_texts).await?;
            let entries: Vec<(ChunkMetadata, Vec<f32>)> = all_metadata.into_iter().zip(vectors).collect();
            self.store.add(entries)?;
        }

        for (filename, page_count, chunk_count) in per_file_chunk_counts {
            if let Err(e) = self
                .repository
                .save_file_record(user_id, &filename, page_count, chunk_count)
                .await
            {
                warn!(filename = %filename, error = %e, "failed to persist file record");
            }
        }

        Ok(IngestionSummary { files: outcomes })
    }

    /// Parses and chunks one file. Files with no extractable text still
    /// succeed with zero chunks — they register so later queries against
    /// them resolve to "no relevant information" rather than "file not found".
    fn process_one(
        &self,
        user_id: i64,
        file: &UploadFile,
    ) -> Result<(i32, Vec<ChunkMetadata>, Vec<String>), ApiError> {
        if !file.filename.to_lowercase().ends_with(".pdf") {
            return Err(ApiError::Validation(format!("{} is not a .pdf file", file.filename)));
        }

        if let Some(kind) = infer::get(&file.bytes) {
            if kind.mime_type() != "application/pdf" {
                return Err(ApiError::Validation(format!(
                    "{} does not look like a PDF (detected {})",
                    file.filename,
                    kind.mime_type()
                )));
            }
        }

        let parsed = DocumentParser::parse(&file.bytes)?;
        if matches!(parsed.status, ExtractionStatus::NoTextExtracted) {
            return Ok((parsed.page_count, Vec::new(), Vec::new()));
        }

        let chunks = self.chunker.chunk_pages(&parsed.pages);
        let mut metadata = Vec::with_capacity(chunks.len());
        let mut texts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            texts.push(chunk.text.clone());
            metadata.push(ChunkMetadata {
                filename: file.filename.clone(),
                user_id,
                page_number: chunk.page_number,
                chunk_id: chunk.chunk_id,
                text: chunk.text,
            });
        }

        Ok((parsed.page_count, metadata, texts))
    }
}
