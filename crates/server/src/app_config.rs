//! Application configuration builders.
//!
//! Loads `Config` and constructs the embedding and LLM subsystems from it.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use mcqgen_core::Config;
use mcqgen_ingest::embedding::create_embedder;
use mcqgen_llm::McqGenerator;

use crate::pipeline::Pipeline;
use crate::state::AppState;

/// Load configuration from environment variables. `main` has already
/// merged `.env` into the environment.
pub fn load_config() -> anyhow::Result<Config> {
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Build the LLM generator, or `None` if the provider cannot be created.
///
/// `api_key` overrides the credential of the configured provider.
pub fn build_generator(config: &Config, api_key: Option<String>) -> Option<McqGenerator> {
    let llm = match api_key {
        Some(key) => config.llm.clone().with_api_key(key),
        None => config.llm.clone(),
    };

    match McqGenerator::from_config(&llm, &config.ollama) {
        Ok(generator) => {
            info!("MCQ generator ready: {}", generator.provider_name());
            Some(generator)
        }
        Err(e) => {
            warn!("LLM provider unavailable ({}), MCQ generation disabled", e);
            None
        }
    }
}

/// Assemble the shared application state.
pub fn build_state(config: Config, api_key: Option<String>) -> anyhow::Result<AppState> {
    let embedder = create_embedder(&config.embedding, &config.ollama, &config.llm)
        .context("failed to create embedding provider")?;
    info!(
        "Embedder: {} ({} dims)",
        embedder.model_name(),
        embedder.dimensions()
    );

    let generator = build_generator(&config, api_key);
    let pipeline = Pipeline::new(&config, Arc::clone(&embedder), generator);

    Ok(AppState { config, pipeline })
}
