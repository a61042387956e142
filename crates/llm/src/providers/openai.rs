use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{chat_messages, http_client, read_json};
use crate::provider::{LlmError, LlmProvider, Message};

/// OpenAI or any server speaking the `/v1/chat/completions` protocol.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
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
            "temperature": temperature,
            "max_tokens": max_tokens,
        })
    }

    /// Text of the first choice. A refusal, or a missing or blank content
    /// field, is reported together with `finish_reason`.
    fn extract_text(resp: &serde_json::Value) -> Result<String, LlmError> {
        let choice = &resp["choices"][0];
        let finish = choice["finish_reason"].as_str().unwrap_or("unknown");

        if let Some(refusal) = choice["message"]["refusal"].as_str() {
            return Err(LlmError::ParseError(format!("model refused: {refusal}")));
        }
        match choice["message"]["content"].as_str() {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            Some(_) => Err(LlmError::ParseError(format!(
                "empty choices[0].message.content (finish_reason: {finish})"
            ))),
            None => Err(LlmError::ParseError(format!(
                "missing choices[0].message.content (finish_reason: {finish})"
            ))),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::build_request_body(&self.model, &messages, temperature, max_tokens);

        debug!("OpenAI request to {} (model={})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        Self::extract_text(&read_json(response).await?)
    }

    fn name(&self) -> String {
        format!("openai/{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_model_and_limits() {
        let messages = vec![Message::system("rules"), Message::user("Make 3 MCQs")];
        let body = OpenAiProvider::build_request_body("gpt-4o-mini", &messages, 0.7, 4096);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 4096);
        let temp = body["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 1e-6);
        assert_eq!(body["messages"][1]["content"], "Make 3 MCQs");
    }

    #[test]
    fn extracts_first_choice() {
        let resp = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "1. What?\nA) x" },
                "finish_reason": "stop"
            }]
        });
        assert_eq!(OpenAiProvider::extract_text(&resp).unwrap(), "1. What?\nA) x");
    }

    #[test]
    fn blank_content_reports_finish_reason() {
        let resp = json!({
            "choices": [{ "message": { "content": "  " }, "finish_reason": "length" }]
        });
        let err = OpenAiProvider::extract_text(&resp).unwrap_err();
        assert!(matches!(err, LlmError::ParseError(_)));
        assert!(err.to_string().contains("length"));
    }

    #[test]
    fn null_content_and_refusals_are_errors() {
        let resp = json!({
            "choices": [{ "message": { "content": null }, "finish_reason": "content_filter" }]
        });
        assert!(OpenAiProvider::extract_text(&resp)
            .unwrap_err()
            .to_string()
            .contains("content_filter"));

        let resp = json!({
            "choices": [{ "message": { "content": null, "refusal": "cannot help" } }]
        });
        assert!(OpenAiProvider::extract_text(&resp)
            .unwrap_err()
            .to_string()
            .contains("cannot help"));

        assert!(OpenAiProvider::extract_text(&json!({})).is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let provider = OpenAiProvider::new("k".into(), "m".into(), "http://localhost:8080/".into());
        assert_eq!(provider.base_url, "http://localhost:8080");
    }
}
