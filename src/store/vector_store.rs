use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::snapshot;
use crate::services::embedding::Embedder;
use crate::utils::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub user_id: i64,
    pub page_number: i32,
    pub chunk_id: i32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub metadata: ChunkMetadata,
    /// L2 distance — lower is a closer match.
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub file_count: usize,
    pub chunk_count: usize,
}

struct Inner {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    metadata: Vec<ChunkMetadata>,
    by_file: HashMap<String, Vec<usize>>,
}

impl Inner {
    fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            metadata: Vec::new(),
            by_file: HashMap::new(),
        }
    }

    fn rebuild_file_index(&mut self) {
        self.by_file.clear();
        for (idx, meta) in self.metadata.iter().enumerate() {
            self.by_file.entry(meta.filename.clone()).or_default().push(idx);
        }
        for indices in self.by_file.values_mut() {
            indices.sort_by_key(|&i| (self.metadata[i].page_number, self.metadata[i].chunk_id));
        }
    }
}

pub struct VectorStore {
    inner: RwLock<Arc<Inner>>,
    vectors_path: String,
    metadata_path: String,
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

impl VectorStore {
    pub fn new(dimension: usize, vectors_path: String, metadata_path: String) -> Self {
        Self {
            inner: RwLock::new(Arc::new(Inner::empty(dimension))),
            vectors_path,
            metadata_path,
        }
    }

    /// Loads a snapshot from disk, falling back to a fresh empty store on any
    /// failure (corrupt files, dimension mismatch) rather than treating that
    /// as a startup fault.
    pub fn load_or_create(dimension: usize, vectors_path: String, metadata_path: String) -> Self {
        match snapshot::load(&vectors_path, &metadata_path) {
            Some(loaded) if loaded.dimension == dimension => {
                let mut inner = Inner {
                    dimension,
                    vectors: loaded.vectors,
                    metadata: loaded.metadata,
                    by_file: HashMap::new(),
                };
                inner.rebuild_file_index();
                debug!(chunks = inner.metadata.len(), "vector store snapshot loaded");
                Self {
                    inner: RwLock::new(Arc::new(inner)),
                    vectors_path,
                    metadata_path,
                }
            }
            Some(loaded) => {
                warn!(
                    expected = dimension,
                    found = loaded.dimension,
                    "vector store snapshot dimension mismatch, starting fresh"
                );
                Self::new(dimension, vectors_path, metadata_path)
            }
            None => Self::new(dimension, vectors_path, metadata_path),
        }
    }

    fn persist(&self, inner: &Inner) {
        if let Err(e) = snapshot::save(
            &self.vectors_path,
            &self.metadata_path,
            inner.dimension,
            &inner.vectors,
            &inner.metadata,
        ) {
            warn!(error = %e, "failed to persist vector store snapshot");
        }
    }

    /// Appends already-embedded chunks. Cheap enough to run entirely under
    /// the writer lock.
    pub fn add(&self, entries: Vec<(ChunkMetadata, Vec<f32>)>) -> Result<usize, ApiError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut guard = self.inner.write();
        let mut next = (**guard).clone_structure();

        for (meta, vector) in entries.iter() {
            if vector.len() != next.dimension {
                return Err(ApiError::Internal(format!(
                    "embedding dimension {} does not match store dimension {}",
                    vector.len(),
                    next.dimension
                )));
            }
            next.metadata.push(meta.clone());
            next.vectors.push(vector.clone());
        }
        next.rebuild_file_index();

        let added = entries.len();
        self.persist(&next);
        *guard = Arc::new(next);
        Ok(added)
    }

    pub fn search(&self, query: &[f32], top_k: usize, filename: Option<&str>, user_id: i64) -> Vec<SearchResult> {
        let inner = self.inner.read().clone();
        if inner.vectors.is_empty() || top_k == 0 {
            return Vec::new();
        }

        // every query is tenant-scoped, so the widened candidate window
        // always applies, the same way the prior system widened it whenever
        // any filter (filename or user) was in play.
        let search_k = (top_k * 3).min(inner.vectors.len());

        let mut scored: Vec<(usize, f32)> = inner
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vector)| (idx, l2_distance(query, vector)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut results = Vec::with_capacity(top_k);
        let mut filtered_out = 0usize;
        let mut considered = 0usize;

        for (idx, distance) in scored {
            if considered >= search_k || results.len() >= top_k {
                break;
            }
            considered += 1;

            let meta = &inner.metadata[idx];
            if meta.user_id != user_id {
                filtered_out += 1;
                continue;
            }
            if let Some(f) = filename {
                if meta.filename != f {
                    filtered_out += 1;
                    continue;
                }
            }

            results.push(SearchResult {
                metadata: meta.clone(),
                score: distance,
            });
        }

        if results.is_empty() && filtered_out > 0 {
            debug!(filtered_out, filename = ?filename, "search returned no matches after filtering");
        }

        results
    }

    /// Expands a seed result set with same-file chunks within `page_range`
    /// pages, deduplicated and sorted by (filename, page, chunk_id).
    pub fn get_adjacent(&self, seeds: &[SearchResult], page_range: i32, user_id: i64) -> Vec<SearchResult> {
        let inner = self.inner.read().clone();

        let mut seen: std::collections::HashSet<(String, i32, i32)> = seeds
            .iter()
            .map(|r| (r.metadata.filename.clone(), r.metadata.page_number, r.metadata.chunk_id))
            .collect();

        let mut out: Vec<SearchResult> = seeds.to_vec();

        for seed in seeds {
            let Some(indices) = inner.by_file.get(&seed.metadata.filename) else {
                continue;
            };
            for &idx in indices {
                let meta = &inner.metadata[idx];
                if meta.user_id != user_id {
                    continue;
                }
                if meta.page_number == seed.metadata.page_number {
                    continue;
                }
                if (meta.page_number - seed.metadata.page_number).abs() > page_range {
                    continue;
                }
                let key = (meta.filename.clone(), meta.page_number, meta.chunk_id);
                if seen.contains(&key) {
                    continue;
                }
                seen.insert(key);
                out.push(SearchResult {
                    metadata: meta.clone(),
                    score: seed.score,
                });
            }
        }

        out.sort_by(|a, b| {
            (a.metadata.filename.as_str(), a.metadata.page_number, a.metadata.chunk_id).cmp(&(
                b.metadata.filename.as_str(),
                b.metadata.page_number,
                b.metadata.chunk_id,
            ))
        });

        out
    }

    /// Returns a file's chunks for a tenant, ordered as stored (page, chunk_id).
    pub fn get_file_chunks(&self, user_id: i64, filename: &str) -> Vec<ChunkMetadata> {
        let inner = self.inner.read().clone();
        let Some(indices) = inner.by_file.get(filename) else {
            return Vec::new();
        };
        indices
            .iter()
            .filter_map(|&idx| {
                let meta = &inner.metadata[idx];
                (meta.user_id == user_id).then(|| meta.clone())
            })
            .collect()
    }

    /// No-op (returns `false`) if the user has no chunks under `filename`.
    /// Rebuilds the remaining chunks' vectors off-lock via `embedder` before
    /// swapping the pointer under the writer lock.
    pub async fn delete_by_filename(
        &self,
        filename: &str,
        user_id: i64,
        embedder: &dyn Embedder,
    ) -> Result<bool, ApiError> {
        let current = self.inner.read().clone();

        let dropped_any = current
            .metadata
            .iter()
            .any(|m| m.filename == filename && m.user_id == user_id);
        if !dropped_any {
            return Ok(false);
        }

        let kept: Vec<ChunkMetadata> = current
            .metadata
            .iter()
            .filter(|m| !(m.filename == filename && m.user_id == user_id))
            .cloned()
            .collect();

        self.replace_kept(current.dimension, kept, embedder).await?;
        Ok(true)
    }

    /// Removes any chunk whose filename matches the prior system's
    /// temp-upload naming convention (`tmp...pdf`). When `valid_filenames`
    /// is given, also drops any chunk for this user whose filename isn't in
    /// that set, so stale chunks left behind by a filename no longer present
    /// in the caller's current file list are swept too.
    pub async fn delete_temp_files_by_user(
        &self,
        user_id: i64,
        valid_filenames: Option<&[String]>,
        embedder: &dyn Embedder,
    ) -> Result<usize, ApiError> {
        let temp_pattern = Regex::new(r"(?i)^tmp[a-z0-9_]+\.pdf$").expect("static regex");
        let valid_set: Option<HashSet<&str>> =
            valid_filenames.map(|names| names.iter().map(String::as_str).collect());
        let current = self.inner.read().clone();

        let should_drop = |m: &ChunkMetadata| {
            m.user_id == user_id
                && (temp_pattern.is_match(&m.filename)
                    || valid_set.as_ref().is_some_and(|set| !set.contains(m.filename.as_str())))
        };

        let to_drop = current.metadata.iter().filter(|m| should_drop(m)).count();
        if to_drop == 0 {
            return Ok(0);
        }

        let kept: Vec<ChunkMetadata> = current.metadata.iter().filter(|m| !should_drop(m)).cloned().collect();

        self.replace_kept(current.dimension, kept, embedder).await?;
        Ok(to_drop)
    }

    async fn replace_kept(
        &self,
        dimension: usize,
        kept: Vec<ChunkMetadata>,
        embedder: &dyn Embedder,
    ) -> Result<(), ApiError> {
        let mut next = Inner::empty(dimension);

        if kept.is_empty() {
            let mut guard = self.inner.write();
            self.persist(&next);
            *guard = Arc::new(next);
            return Ok(());
        }

        let texts: Vec<String> = kept.iter().map(|m| m.text.clone()).collect();
        let vectors = embedder.encode(&texts).await?;

        next.metadata = kept;
        next.vectors = vectors;
        next.rebuild_file_index();

        let mut guard = self.inner.write();
        self.persist(&next);
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn clear_all(&self, user_id: i64) {
        let current = self.inner.read().clone();
        let mut next = Inner::empty(current.dimension);
        for (idx, meta) in current.metadata.iter().enumerate() {
            if meta.user_id != user_id {
                next.metadata.push(meta.clone());
                next.vectors.push(current.vectors[idx].clone());
            }
        }
        next.rebuild_file_index();

        let mut guard = self.inner.write();
        self.persist(&next);
        *guard = Arc::new(next);
    }

    pub fn get_stats(&self, user_id: i64) -> StoreStats {
        let inner = self.inner.read().clone();
        let mut files = std::collections::HashSet::new();
        let mut chunk_count = 0usize;
        for meta in inner.metadata.iter().filter(|m| m.user_id == user_id) {
            files.insert(meta.filename.as_str());
            chunk_count += 1;
        }
        StoreStats {
            file_count: files.len(),
            chunk_count,
        }
    }

    pub fn total_chunk_count(&self) -> usize {
        self.inner.read().metadata.len()
    }
}

impl Inner {
    fn clone_structure(&self) -> Inner {
        Inner {
            dimension: self.dimension,
            vectors: self.vectors.clone(),
            metadata: self.metadata.clone(),
            by_file: self.by_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct IdentityEmbedder {
        dim: usize,
    }

    #[async_trait]
    impl Embedder for IdentityEmbedder {
        async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(texts.iter().map(|_| vec![0.0; self.dim]).collect())
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    fn meta(filename: &str, user_id: i64, page: i32, chunk: i32) -> ChunkMetadata {
        ChunkMetadata {
            filename: filename.to_string(),
            user_id,
            page_number: page,
            chunk_id: chunk,
            text: format!("text-{page}-{chunk}"),
        }
    }

    fn temp_store() -> VectorStore {
        let dir = std::env::temp_dir().join(format!("ragviet-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        VectorStore::new(
            2,
            dir.join("vectors.bin").to_string_lossy().to_string(),
            dir.join("metadata.json").to_string_lossy().to_string(),
        )
    }

    #[test]
    fn add_keeps_vectors_and_metadata_in_lockstep() {
        let store = temp_store();
        store
            .add(vec![
                (meta("a.pdf", 1, 1, 0), vec![0.0, 0.0]),
                (meta("a.pdf", 1, 1, 1), vec![1.0, 1.0]),
            ])
            .unwrap();
        assert_eq!(store.total_chunk_count(), 2);
    }

    #[test]
    fn search_is_tenant_isolated() {
        let store = temp_store();
        store
            .add(vec![
                (meta("a.pdf", 1, 1, 0), vec![0.0, 0.0]),
                (meta("a.pdf", 2, 1, 0), vec![0.0, 0.0]),
            ])
            .unwrap();

        let results = store.search(&[0.0, 0.0], 10, None, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.user_id, 1);
    }

    #[test]
    fn search_respects_filename_filter() {
        let store = temp_store();
        store
            .add(vec![
                (meta("a.pdf", 1, 1, 0), vec![0.0, 0.0]),
                (meta("b.pdf", 1, 1, 0), vec![0.0, 0.0]),
            ])
            .unwrap();

        let results = store.search(&[0.0, 0.0], 10, Some("a.pdf"), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.filename, "a.pdf");
    }

    #[test]
    fn adjacent_expansion_excludes_same_page_and_dedupes() {
        let store = temp_store();
        store
            .add(vec![
                (meta("a.pdf", 1, 5, 0), vec![0.0, 0.0]),
                (meta("a.pdf", 1, 6, 0), vec![0.1, 0.1]),
                (meta("a.pdf", 1, 9, 0), vec![0.2, 0.2]),
            ])
            .unwrap();

        let seed = store.search(&[0.0, 0.0], 1, None, 1);
        let expanded = store.get_adjacent(&seed, 2, 1);

        let pages: Vec<i32> = expanded.iter().map(|r| r.metadata.page_number).collect();
        assert!(pages.contains(&6));
        assert!(!pages.contains(&9));
    }

    #[tokio::test]
    async fn delete_by_filename_is_noop_when_nothing_matches() {
        let store = temp_store();
        store.add(vec![(meta("a.pdf", 1, 1, 0), vec![0.0, 0.0])]).unwrap();
        let embedder = IdentityEmbedder { dim: 2 };
        let dropped = store.delete_by_filename("missing.pdf", 1, &embedder).await.unwrap();
        assert!(!dropped);
        assert_eq!(store.total_chunk_count(), 1);
    }

    #[tokio::test]
    async fn delete_by_filename_resets_to_empty_when_nothing_left() {
        let store = temp_store();
        store.add(vec![(meta("a.pdf", 1, 1, 0), vec![0.0, 0.0])]).unwrap();
        let embedder = IdentityEmbedder { dim: 2 };
        let dropped = store.delete_by_filename("a.pdf", 1, &embedder).await.unwrap();
        assert!(dropped);
        assert_eq!(store.total_chunk_count(), 0);
    }

    #[tokio::test]
    async fn delete_temp_files_by_user_drops_temp_named_and_stale_chunks() {
        let store = temp_store();
        store
            .add(vec![
                (meta("tmpA1b2c3.pdf", 1, 1, 0), vec![0.0, 0.0]),
                (meta("report.pdf", 1, 1, 0), vec![0.0, 0.0]),
                (meta("stale.pdf", 1, 1, 0), vec![0.0, 0.0]),
                (meta("report.pdf", 2, 1, 0), vec![0.0, 0.0]),
            ])
            .unwrap();
        let embedder = IdentityEmbedder { dim: 2 };

        let valid = vec!["report.pdf".to_string()];
        let dropped = store.delete_temp_files_by_user(1, Some(&valid), &embedder).await.unwrap();

        assert_eq!(dropped, 2);
        assert_eq!(store.get_stats(1).chunk_count, 1);
        assert_eq!(store.get_stats(2).chunk_count, 1);
    }

    #[tokio::test]
    async fn delete_temp_files_by_user_without_valid_set_only_matches_temp_names() {
        let store = temp_store();
        store
            .add(vec![
                (meta("tmpXYZ.pdf", 1, 1, 0), vec![0.0, 0.0]),
                (meta("keep.pdf", 1, 1, 0), vec![0.0, 0.0]),
            ])
            .unwrap();
        let embedder = IdentityEmbedder { dim: 2 };

        let dropped = store.delete_temp_files_by_user(1, None, &embedder).await.unwrap();

        assert_eq!(dropped, 1);
        assert_eq!(store.get_stats(1).chunk_count, 1);
    }

    #[test]
    fn clear_all_only_affects_target_tenant() {
        let store = temp_store();
        store
            .add(vec![
                (meta("a.pdf", 1, 1, 0), vec![0.0, 0.0]),
                (meta("a.pdf", 2, 1, 0), vec![0.0, 0.0]),
            ])
            .unwrap();
        store.clear_all(1);
        assert_eq!(store.get_stats(1).chunk_count, 0);
        assert_eq!(store.get_stats(2).chunk_count, 1);
    }
}
