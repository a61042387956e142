use std::sync::Arc;

use mcqgen_core::config::{LlmConfig, OllamaConfig};
use tracing::{debug, info};

use crate::provider::{LlmError, LlmProvider, Message};

/// Sampling parameters passed to every completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationSettings {
    pub fn from_config(llm_config: &LlmConfig) -> Self {
        Self {
            temperature: llm_config.temperature,
            max_tokens: llm_config.max_tokens,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("number of questions must be at least 1, got {0}")]
    InvalidCount(u32),
    #[error("LLM error: {0}")]
    Provider(#[from] LlmError),
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// Render the fixed MCQ prompt for `num_mcqs` questions over `context`.
pub fn build_prompt(num_mcqs: u32, context: &str) -> String {
    format!(
        "You are a professional exam content creator. Based on the context below, \
generate {num_mcqs} multiple-choice questions (MCQs).
Each question should include:
- A clear, concise question
- Four options labeled A, B, C, and D
- The correct answer in format 'Answer: X'
- A one-line explanation for why the answer is correct

Be relevant, accurate, and base your questions on the provided content.

CONTEXT:
{context}
"
    )
}

/// Turns document context into multiple-choice questions via an LLM.
pub struct McqGenerator {
    provider: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

impl McqGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    /// Build from config, creating the appropriate provider.
    pub fn from_config(
        llm_config: &LlmConfig,
        ollama_config: &OllamaConfig,
    ) -> Result<Self, LlmError> {
        let provider = crate::providers::create_provider(llm_config, ollama_config)?;
        Ok(Self::new(provider, GenerationSettings::from_config(llm_config)))
    }

    pub fn provider_name(&self) -> String {
        self.provider.name()
    }

    /// Ask the model for `num_mcqs` questions grounded in `context` and
    /// return its whitespace-trimmed text.
    ///
    /// The context is passed through as-is, even when empty.
    pub async fn generate(&self, num_mcqs: u32, context: &str) -> Result<String, GenerationError> {
        if num_mcqs == 0 {
            return Err(GenerationError::InvalidCount(num_mcqs));
        }

        info!(
            "Generating {} MCQs with {} from {} chars of context",
            num_mcqs,
            self.provider.name(),
            context.chars().count()
        );

        let messages = vec![Message::user(build_prompt(num_mcqs, context))];
        let response = self
            .provider
            .complete(messages, self.settings.temperature, self.settings.max_tokens)
            .await?;

        let text = response.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        debug!("LLM response: {} chars", text.len());
        Ok(text.to_string())
    }
}
