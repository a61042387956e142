//! Document ingestion for MCQ generation: PDF text extraction, chunking,
//! embedding, and the per-request vector index used for retrieval.

pub mod document;
pub mod embedding;
pub mod index;

pub use document::chunker::{chunk_text, Chunk, ChunkConfig};
pub use document::{ExtractedDocument, ExtractionError, PageContent};
pub use embedding::{Embedder, EmbeddingError};
pub use index::{IndexState, RetrievalError, ScoredChunk, VectorIndex};
