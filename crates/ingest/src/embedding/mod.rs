pub mod hashing;
pub mod ollama;
pub mod openai;
mod remote;
pub mod traits;

use std::sync::Arc;

use mcqgen_core::config::{EmbeddingConfig, LlmConfig, OllamaConfig};

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;
pub use traits::{Embedder, EmbeddingError};

/// Create the embedding backend selected by `EMBEDDING_PROVIDER`.
pub fn create_embedder(
    embedding: &EmbeddingConfig,
    ollama: &OllamaConfig,
    llm: &LlmConfig,
) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match embedding.provider.as_str() {
        "hashing" | "local" => Ok(Arc::new(HashingEmbedder::new(embedding.dimensions))),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            ollama.url.clone(),
            ollama.embedding_model.clone(),
            embedding.dimensions,
        ))),
        "openai" => {
            let api_key = llm
                .openai_api_key
                .clone()
                .ok_or_else(|| EmbeddingError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            Ok(Arc::new(OpenAiEmbedder::new(
                api_key,
                embedding.model.clone(),
                llm.openai_base_url.clone(),
                embedding.dimensions,
            )))
        }
        other => Err(EmbeddingError::NotConfigured(format!(
            "unknown embedding provider: '{other}'"
        ))),
    }
}
