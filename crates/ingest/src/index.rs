//! Per-request in-memory vector index and top-K retrieval.
//!
//! The index is built from one document's chunks, lives for one request, and
//! is never persisted. `IndexState` makes a failed build explicit so retrieval
//! against a missing index is a typed error instead of empty context.

use thiserror::Error;

use crate::document::chunker::Chunk;
use crate::embedding::{Embedder, EmbeddingError};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("vector index not built: {reason}")]
    IndexNotBuilt { reason: String },

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// A chunk with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

struct IndexEntry {
    embedding: Vec<f32>,
    chunk: Chunk,
}

/// Exhaustive cosine-similarity index over one document's chunks.
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("len", &self.entries.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl VectorIndex {
    /// Embed every chunk (in batches of `batch_size`) and index it.
    ///
    /// Either all chunks are indexed or an error is returned.
    pub async fn build(
        embedder: &dyn Embedder,
        chunks: &[Chunk],
        batch_size: usize,
    ) -> Result<Self, EmbeddingError> {
        let batch_size = batch_size.max(1);
        let dimensions = embedder.dimensions();
        let mut entries = Vec::with_capacity(chunks.len());
        let total_batches = chunks.len().div_ceil(batch_size);

        for (i, batch) in chunks.chunks(batch_size).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{} ({} chunks)",
                i + 1,
                total_batches,
                batch.len()
            );
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let vectors = embedder.embed_batch(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }
            for (chunk, embedding) in batch.iter().zip(vectors) {
                if embedding.len() != dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dimensions,
                        actual: embedding.len(),
                    });
                }
                entries.push(IndexEntry {
                    embedding,
                    chunk: chunk.clone(),
                });
            }
        }

        Ok(Self { entries, dimensions })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Rank chunks against a precomputed query vector.
    ///
    /// Descending score; equal scores keep document order. `top_k` of zero
    /// is treated as one, and a `top_k` beyond the index size returns all.
    pub fn search_vector(&self, query: &[f32], top_k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(query, &e.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.index.cmp(&b.chunk.index))
        });
        scored.truncate(top_k.max(1));
        scored
    }

    /// Embed `query` and return the `top_k` most similar chunks.
    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = embedder
            .embed_batch(&[query])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch { expected: 1, actual: 0 })?;
        Ok(self.search_vector(&query_vec, top_k))
    }

    /// Top-K chunk contents joined with blank lines, best match first.
    pub async fn retrieve(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        top_k: usize,
    ) -> Result<String, RetrievalError> {
        let hits = self.search(embedder, query, top_k).await?;
        Ok(hits
            .iter()
            .map(|h| h.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

/// Outcome of building the per-request index.
#[derive(Debug)]
pub enum IndexState {
    Built(VectorIndex),
    Unavailable { reason: String },
}

impl IndexState {
    /// Build the index, logging and recording any failure instead of
    /// propagating it.
    pub async fn build(embedder: &dyn Embedder, chunks: &[Chunk], batch_size: usize) -> Self {
        match VectorIndex::build(embedder, chunks, batch_size).await {
            Ok(index) => {
                tracing::info!(
                    "Vector index built: {} chunks, {} dims ({})",
                    index.len(),
                    index.dimensions(),
                    embedder.model_name()
                );
                IndexState::Built(index)
            }
            Err(e) => {
                tracing::error!("Vector index build failed: {}", e);
                IndexState::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn is_built(&self) -> bool {
        matches!(self, IndexState::Built(_))
    }

    pub fn index(&self) -> Result<&VectorIndex, RetrievalError> {
        match self {
            IndexState::Built(index) => Ok(index),
            IndexState::Unavailable { reason } => Err(RetrievalError::IndexNotBuilt {
                reason: reason.clone(),
            }),
        }
    }

    pub async fn retrieve(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        top_k: usize,
    ) -> Result<String, RetrievalError> {
        self.index()?.retrieve(embedder, query, top_k).await
    }
}

/// Cosine similarity; zero for mismatched lengths or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(index: usize, content: &str) -> Chunk {
        Chunk {
            index,
            content: content.to_string(),
            char_offset: 0,
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk(0, "Paris is the capital of France."),
            chunk(1, "Photosynthesis converts light into chemical energy."),
            chunk(2, "The Seine river flows through Paris."),
        ]
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Api("503: model loading".into()))
        }
        fn dimensions(&self) -> usize {
            4
        }
        fn model_name(&self) -> &str {
            "failing"
        }
    }

    /// Returns one vector too few to exercise the count check.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0; 4]).collect())
        }
        fn dimensions(&self) -> usize {
            4
        }
        fn model_name(&self) -> &str {
            "short"
        }
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
        inner: HashingEmbedder,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn every_chunk_is_indexed() {
        let embedder = HashingEmbedder::new(256);
        let chunks = corpus();
        let index = VectorIndex::build(&embedder, &chunks, 2).await.unwrap();
        assert_eq!(index.len(), chunks.len());
        assert_eq!(index.dimensions(), 256);
    }

    #[tokio::test]
    async fn builds_in_batches() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
            inner: HashingEmbedder::new(64),
        };
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk(i, &format!("chunk {i}"))).collect();
        let index = VectorIndex::build(&embedder, &chunks, 2).await.unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retrieves_most_similar_first() {
        let embedder = HashingEmbedder::new(512);
        let index = VectorIndex::build(&embedder, &corpus(), 64).await.unwrap();
        let hits = index.search(&embedder, "photosynthesis light energy", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.index, 1);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn top_k_beyond_size_returns_all() {
        let embedder = HashingEmbedder::new(128);
        let index = VectorIndex::build(&embedder, &corpus(), 64).await.unwrap();
        let hits = index.search(&embedder, "Paris", 50).await.unwrap();
        assert_eq!(hits.len(), 3);

        let context = index.retrieve(&embedder, "Paris", 50).await.unwrap();
        assert_eq!(context.split("\n\n").count(), 3);
    }

    #[tokio::test]
    async fn zero_top_k_returns_one() {
        let embedder = HashingEmbedder::new(128);
        let index = VectorIndex::build(&embedder, &corpus(), 64).await.unwrap();
        assert_eq!(index.search(&embedder, "Paris", 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ties_keep_document_order() {
        let index = VectorIndex {
            entries: (0..3)
                .map(|i| IndexEntry {
                    embedding: vec![1.0, 0.0],
                    chunk: chunk(i, &format!("c{i}")),
                })
                .collect(),
            dimensions: 2,
        };
        let hits = index.search_vector(&[1.0, 0.0], 3);
        let order: Vec<usize> = hits.iter().map(|h| h.chunk.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn failed_build_is_unavailable_and_retrieval_errors() {
        let state = IndexState::build(&FailingEmbedder, &corpus(), 8).await;
        assert!(!state.is_built());

        let err = state.retrieve(&FailingEmbedder, "Paris", 5).await.unwrap_err();
        match err {
            RetrievalError::IndexNotBuilt { reason } => assert!(reason.contains("model loading")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn short_embedding_response_is_rejected() {
        let err = VectorIndex::build(&ShortEmbedder, &corpus(), 8).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::CountMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn empty_chunks_build_empty_index() {
        let embedder = HashingEmbedder::new(32);
        let state = IndexState::build(&embedder, &[], 8).await;
        let index = state.index().unwrap();
        assert!(index.is_empty());
        assert_eq!(index.retrieve(&embedder, "anything", 5).await.unwrap(), "");
    }
}
