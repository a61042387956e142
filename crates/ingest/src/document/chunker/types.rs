//! Chunk configuration and output types.

use mcqgen_core::config::PipelineConfig;
use mcqgen_core::ConfigError;

// ── Configuration ───────────────────────────────────────────────────────────

/// Separators tried in order: paragraph, line, word, character.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Configuration for the chunking engine. Sizes are in characters.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum characters per chunk (default: 1000).
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk (default: 150).
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        PipelineConfig::check_chunking(self.chunk_size, self.chunk_overlap)
    }
}

// ── Chunk output ────────────────────────────────────────────────────────────

/// A chunk of text in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based index within the document.
    pub index: usize,
    /// The chunk text content.
    pub content: String,
    /// Character (not byte) offset of the chunk start in the source text.
    pub char_offset: usize,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}
