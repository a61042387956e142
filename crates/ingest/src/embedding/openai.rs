use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::remote::{check_vectors, http_client, read_json};
use super::traits::{Embedder, EmbeddingError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI-compatible `/v1/embeddings` backend.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, base_url: Option<String>, dimensions: usize) -> Self {
        let base_url = base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Self {
            client: http_client(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimensions,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

#[derive(Deserialize)]
struct EmbedItem {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbedResponse {
    /// Vectors in input order; the API may return items out of order.
    fn into_ordered(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|item| item.index);
        self.data.into_iter().map(|item| item.embedding).collect()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };
        debug!("OpenAI embedding batch of {} (model={})", texts.len(), self.model);

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let parsed: EmbedResponse = read_json(response).await?;
        check_vectors(parsed.into_ordered(), texts.len(), self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_asks_for_configured_width() {
        let texts = ["a", "b"];
        let request = EmbedRequest { model: "text-embedding-3-small", input: &texts, dimensions: 384 };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["dimensions"], 384);
        assert_eq!(value["input"][1], "b");
    }

    #[test]
    fn response_items_are_reordered_by_index() {
        let resp: EmbedResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#,
        )
        .unwrap();
        assert_eq!(resp.into_ordered(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn default_base_url_is_used_without_override() {
        let e = OpenAiEmbedder::new("k".into(), "m".into(), None, 8);
        assert_eq!(e.base_url, DEFAULT_BASE_URL);
        let e = OpenAiEmbedder::new("k".into(), "m".into(), Some("http://proxy/".into()), 8);
        assert_eq!(e.base_url, "http://proxy");
    }
}
