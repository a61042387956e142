use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{http_client, read_json};
use crate::provider::{LlmError, LlmProvider, Message, Role};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
        }
    }

    /// Build the request body for the Gemini generateContent API.
    fn build_request_body(
        messages: &[Message],
        temperature: f32,
        max_tokens: u32,
    ) -> serde_json::Value {
        // Gemini uses a separate system_instruction field
        let system_msg = messages
            .iter()
            .find(|m| matches!(m.role, Role::System))
            .map(|m| m.content.clone());

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                    Role::System => return None,
                };
                Some(json!({
                    "role": role,
                    "parts": [{ "text": m.content }],
                }))
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        });

        if let Some(system) = system_msg {
            body["system_instruction"] = json!({
                "parts": [{ "text": system }],
            });
        }

        body
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(resp: &serde_json::Value) -> Result<String, LlmError> {
        if let Some(reason) = resp["promptFeedback"]["blockReason"].as_str() {
            return Err(LlmError::ParseError(format!("prompt blocked: {reason}")));
        }

        let parts = resp["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| {
                let finish = resp["candidates"][0]["finishReason"]
                    .as_str()
                    .unwrap_or("unknown");
                LlmError::ParseError(format!(
                    "missing candidates[0].content.parts (finishReason: {finish})"
                ))
            })?;

        let text: String = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect();
        if text.trim().is_empty() {
            let finish = resp["candidates"][0]["finishReason"].as_str().unwrap_or("unknown");
            return Err(LlmError::ParseError(format!("empty candidate text (finishReason: {finish})")));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", GEMINI_BASE_URL, self.model);

        let body = Self::build_request_body(&messages, temperature, max_tokens);

        debug!("Gemini request to model={}", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        Self::extract_text(&read_json(response).await?)
    }

    fn name(&self) -> String {
        format!("gemini/{}", self.model)
    }
}
