//! Chunking entry points.

use super::helpers::{split_recursive, Span};
use super::types::{Chunk, ChunkConfig};
use crate::document::ExtractedDocument;

/// Split raw text into ordered, overlapping chunks. Each chunk is a
/// contiguous slice of `text`.
///
/// Empty or whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    split_recursive(text, Span::whole(text), &config.separators, config)
        .into_iter()
        .enumerate()
        .map(|(index, span)| Chunk {
            index,
            content: span.slice(text).to_string(),
            char_offset: span.char_start,
        })
        .collect()
}

/// Chunk the full text of an extracted document (pages joined by blank lines).
pub fn chunk_document(doc: &ExtractedDocument, config: &ChunkConfig) -> Vec<Chunk> {
    chunk_text(&doc.full_text(), config)
}

/// Concatenate chunk contents in order.
pub fn join_chunks(chunks: &[Chunk], separator: &str) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}
