//! Recursive character chunking.
//!
//! Splits extracted text into overlapping, size-bounded chunks suitable for
//! embedding. Natural boundaries (paragraphs, lines, words) are preferred;
//! hard character cuts are the last resort.

mod helpers;
mod strategies;
mod types;

pub use strategies::{chunk_document, chunk_text, join_chunks};
pub use types::{Chunk, ChunkConfig, DEFAULT_SEPARATORS};
