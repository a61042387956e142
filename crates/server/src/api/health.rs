use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub llm_provider: String,
    /// Whether an LLM provider was constructed at startup.
    pub llm_ready: bool,
    pub embedding_provider: String,
}

/// Server health and configured providers
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = &state.config;
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        llm_provider: format!(
            "{}/{}",
            config.llm.provider,
            config.llm.active_model(&config.ollama)
        ),
        llm_ready: state.pipeline.has_generator(),
        embedding_provider: config.embedding.provider.clone(),
    })
}
