//! Plumbing shared by the HTTP embedding backends.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use super::traits::EmbeddingError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Decode a JSON response body, mapping any non-2xx status to `Api`.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, EmbeddingError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::Api(format!("{status}: {body}")));
    }
    Ok(response.json().await?)
}

/// Reject a batch whose size or any vector's width differs from what was
/// asked for. The index relies on one vector per chunk.
pub(crate) fn check_vectors(
    vectors: Vec<Vec<f32>>,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimensions,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}
