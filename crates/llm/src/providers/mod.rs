pub mod gemini;
pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use mcqgen_core::config::{LlmConfig, OllamaConfig};

use crate::provider::{LlmError, LlmProvider, Message};

/// Generation over a whole document can take minutes on slow models.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Decode a JSON response body, mapping any non-2xx status to `ApiError`.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

/// `[{role, content}]` as accepted by OpenAI-compatible and Ollama chat APIs.
pub(crate) fn chat_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect()
}

/// Create the appropriate LLM provider based on config.
pub fn create_provider(
    llm_config: &LlmConfig,
    ollama_config: &OllamaConfig,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match llm_config.provider.as_str() {
        "gemini" | "google" => {
            let api_key = llm_config
                .gemini_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("GEMINI_API_KEY not set".into()))?;
            Ok(Arc::new(gemini::GeminiProvider::new(
                api_key.clone(),
                llm_config.gemini_model.clone(),
            )))
        }
        "openai" => {
            let api_key = llm_config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = llm_config
                .openai_base_url
                .as_deref()
                .unwrap_or("https://api.openai.com");
            Ok(Arc::new(openai::OpenAiProvider::new(
                api_key.clone(),
                llm_config.openai_model.clone(),
                base_url.to_string(),
            )))
        }
        "ollama" => Ok(Arc::new(ollama::OllamaProvider::new(
            ollama_config.url.clone(),
            ollama_config.model.clone(),
        ))),
        other => Err(LlmError::NotConfigured(format!(
            "unknown LLM provider: '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcqgen_core::Config;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_map("", &vars)
    }

    #[test]
    fn gemini_without_key_is_not_configured() {
        let c = config(&[]);
        let err = create_provider(&c.llm, &c.ollama).err().unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn gemini_with_key() {
        let c = config(&[("GEMINI_API_KEY", "k")]);
        let provider = create_provider(&c.llm, &c.ollama).unwrap();
        assert_eq!(provider.name(), "gemini/gemini-1.5-flash");
    }

    #[test]
    fn overridden_key_is_used() {
        let c = config(&[]);
        let llm = c.llm.with_api_key("from-cli");
        assert!(create_provider(&llm, &c.ollama).is_ok());
    }

    #[test]
    fn ollama_needs_no_key() {
        let c = config(&[("LLM_PROVIDER", "ollama")]);
        let provider = create_provider(&c.llm, &c.ollama).unwrap();
        assert_eq!(provider.name(), "ollama/llama3.2");
    }

    #[test]
    fn chat_messages_keep_order_and_roles() {
        let messages = vec![Message::system("rules"), Message::user("question")];
        let out = chat_messages(&messages);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({ "role": "system", "content": "rules" }));
        assert_eq!(out[1]["role"], "user");
    }

    #[test]
    fn openai_uses_configured_model() {
        let c = config(&[("LLM_PROVIDER", "openai"), ("OPENAI_API_KEY", "sk")]);
        let provider = create_provider(&c.llm, &c.ollama).unwrap();
        assert_eq!(provider.name(), "openai/gpt-4o-mini");
    }

    #[test]
    fn unknown_provider() {
        let c = config(&[("LLM_PROVIDER", "clippy")]);
        assert!(matches!(
            create_provider(&c.llm, &c.ollama).err().unwrap(),
            LlmError::NotConfigured(_)
        ));
    }
}
