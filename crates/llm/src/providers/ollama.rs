use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{chat_messages, http_client, read_json};
use crate::provider::{LlmError, LlmProvider, Message};

/// Local model served by Ollama's `/api/chat`.
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            client: http_client(),
            url: url.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn build_request_body(
        model: &str,
        messages: &[Message],
        temperature: f32,
        max_tokens: u32,
    ) -> serde_json::Value {
        json!({
            "model": model,
            "messages": chat_messages(messages),
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": max_tokens,
            },
        })
    }

    fn extract_text(resp: &serde_json::Value) -> Result<String, LlmError> {
        if let Some(error) = resp["error"].as_str() {
            return Err(LlmError::ParseError(format!("ollama error: {error}")));
        }
        let done = resp["done_reason"].as_str().unwrap_or("unknown");
        match resp["message"]["content"].as_str() {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            Some(_) => Err(LlmError::ParseError(format!(
                "empty message.content (done_reason: {done})"
            ))),
            None => Err(LlmError::ParseError(format!(
                "missing message.content (done_reason: {done})"
            ))),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.url);
        let body = Self::build_request_body(&self.model, &messages, temperature, max_tokens);

        debug!("Ollama request to {} (model={})", url, self.model);

        let response = self.client.post(&url).json(&body).send().await?;
        Self::extract_text(&read_json(response).await?)
    }

    fn name(&self) -> String {
        format!("ollama/{}", self.model)
    }
}
