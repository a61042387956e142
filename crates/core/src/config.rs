use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Key lookup with optional profile prefixing.
///
/// With a non-empty profile every key is first looked up as
/// `{PROFILE}_{KEY}`, falling back to `{KEY}`. Empty values count as unset.
struct EnvSource<'a> {
    profile: &'a str,
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvSource<'_> {
    fn opt(&self, key: &str) -> Option<String> {
        if !self.profile.is_empty() {
            let prefixed = format!("{}_{}", self.profile, key);
            if let Some(v) = (self.lookup)(&prefixed).filter(|s| !s.is_empty()) {
                return Some(v);
            }
        }
        (self.lookup)(key).filter(|s| !s.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.opt(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.opt(key).map(|v| v.to_lowercase()) {
            Some(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
            None => default,
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub embedding: EmbeddingConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MCQGEN_PROFILE`.
    pub fn from_env() -> Self {
        let profile = env::var("MCQGEN_PROFILE").unwrap_or_default().to_uppercase();
        Self::from_lookup(&profile, &|key: &str| env::var(key).ok())
    }

    /// Build config from an explicit key/value map instead of the process env.
    pub fn from_map(profile: &str, vars: &HashMap<String, String>) -> Self {
        Self::from_lookup(profile, &|key: &str| vars.get(key).cloned())
    }

    fn from_lookup(profile: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let p = profile.to_uppercase();
        let src = EnvSource { profile: &p, lookup };
        Self {
            profile: p.clone(),
            server: ServerConfig::from_source(&src),
            llm: LlmConfig::from_source(&src),
            ollama: OllamaConfig::from_source(&src),
            embedding: EmbeddingConfig::from_source(&src),
            pipeline: PipelineConfig::from_source(&src),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Check cross-field constraints that would otherwise surface mid-request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pipeline = &self.pipeline;
        PipelineConfig::check_chunking(pipeline.chunk_size, pipeline.chunk_overlap)?;
        if pipeline.max_questions == 0 {
            return Err(ConfigError::Invalid {
                key: "MCQ_MAX_QUESTIONS",
                reason: "must be greater than zero".into(),
            });
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid {
                key: "EMBEDDING_DIMENSIONS",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}, cors={}", self.server.host, self.server.port, self.server.cors_origin);
        tracing::info!(
            "  llm:         provider={}, model={}, key={}",
            self.llm.provider,
            self.llm.active_model(&self.ollama),
            if self.llm.is_configured() { "set" } else { "(none)" }
        );
        tracing::info!("  embedding:   provider={}, dims={}", self.embedding.provider, self.embedding.dimensions);
        tracing::info!(
            "  pipeline:    chunk={}/{}, mode={}, top_k={}",
            self.pipeline.chunk_size,
            self.pipeline.chunk_overlap,
            self.pipeline.context_mode,
            self.pipeline.top_k
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub max_upload_mb: usize,
    /// Where uploads are staged while a request runs. `None` = system temp dir.
    pub upload_dir: Option<PathBuf>,
}

impl ServerConfig {
    fn from_source(src: &EnvSource<'_>) -> Self {
        Self {
            host: src.or("HOST", "0.0.0.0"),
            port: src.parsed("PORT", 8000),
            cors_origin: src.or("CORS_ORIGIN", "*"),
            max_upload_mb: src.parsed("MAX_UPLOAD_MB", 50),
            upload_dir: src.opt("UPLOAD_DIR").map(PathBuf::from),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

// ── LLM (Gemini / OpenAI / Ollama) ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "gemini", "openai", "ollama"
    pub provider: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    fn from_source(src: &EnvSource<'_>) -> Self {
        Self {
            provider: src.or("LLM_PROVIDER", "gemini").to_lowercase(),
            gemini_api_key: src.opt("GEMINI_API_KEY"),
            gemini_model: src.or("GEMINI_MODEL", "gemini-1.5-flash"),
            openai_api_key: src.opt("OPENAI_API_KEY"),
            openai_model: src.or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: src.opt("OPENAI_BASE_URL"),
            temperature: src.parsed("LLM_TEMPERATURE", 0.7),
            max_tokens: src.parsed("LLM_MAX_TOKENS", 4096),
        }
    }

    /// Replace the credential of the active provider, leaving the rest intact.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        match self.provider.as_str() {
            "openai" => self.openai_api_key = Some(key),
            _ => self.gemini_api_key = Some(key),
        }
        self
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "gemini" | "google" => self.gemini_api_key.is_some(),
            "openai" => self.openai_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }

    pub fn active_model<'a>(&'a self, ollama: &'a OllamaConfig) -> &'a str {
        match self.provider.as_str() {
            "openai" => &self.openai_model,
            "ollama" => &ollama.model,
            _ => &self.gemini_model,
        }
    }
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub embedding_model: String,
}

impl OllamaConfig {
    fn from_source(src: &EnvSource<'_>) -> Self {
        Self {
            url: src.or("OLLAMA_URL", "http://localhost:11434"),
            model: src.or("OLLAMA_MODEL", "llama3.2"),
            embedding_model: src.or("OLLAMA_EMBEDDING_MODEL", "all-minilm"),
        }
    }
}

// ── Embedding ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "hashing", "ollama", "openai"
    pub provider: String,
    /// Model identifier for remote providers (OpenAI); Ollama uses `OllamaConfig`.
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
}

impl EmbeddingConfig {
    fn from_source(src: &EnvSource<'_>) -> Self {
        Self {
            provider: src.or("EMBEDDING_PROVIDER", "hashing").to_lowercase(),
            model: src.or("EMBEDDING_MODEL", "text-embedding-3-small"),
            dimensions: src.parsed("EMBEDDING_DIMENSIONS", 384),
            batch_size: src.parsed("EMBEDDING_BATCH_SIZE", 64),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────

/// How the generation context is assembled from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// Every chunk, in document order.
    Full,
    /// Top-K chunks for a query.
    Retrieval,
}

impl std::fmt::Display for ContextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextMode::Full => f.write_str("full"),
            ContextMode::Retrieval => f.write_str("retrieval"),
        }
    }
}

impl std::str::FromStr for ContextMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(ContextMode::Full),
            "retrieval" | "retrieve" => Ok(ContextMode::Retrieval),
            other => Err(ConfigError::Invalid {
                key: "CONTEXT_MODE",
                reason: format!("unknown mode '{other}' (expected 'full' or 'retrieval')"),
            }),
        }
    }
}

pub const DEFAULT_RETRIEVAL_QUERY: &str =
    "key facts, definitions, and concepts suitable for exam questions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub context_mode: ContextMode,
    pub retrieval_query: String,
    pub max_questions: u32,
    /// Include parsed questions in responses.
    pub validate_output: bool,
}

impl PipelineConfig {
    fn from_source(src: &EnvSource<'_>) -> Self {
        let context_mode = match src.opt("CONTEXT_MODE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{e}, falling back to 'full'");
                ContextMode::Full
            }),
            None => ContextMode::Full,
        };
        Self {
            chunk_size: src.parsed("CHUNK_SIZE", 1000),
            chunk_overlap: src.parsed("CHUNK_OVERLAP", 150),
            top_k: src.parsed("RETRIEVAL_TOP_K", 5),
            context_mode,
            retrieval_query: src.or("RETRIEVAL_QUERY", DEFAULT_RETRIEVAL_QUERY),
            max_questions: src.parsed("MCQ_MAX_QUESTIONS", 50),
            validate_output: src.flag("MCQ_VALIDATE", false),
        }
    }

    /// Chunk size must be non-zero and strictly larger than the overlap.
    pub fn check_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<(), ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_SIZE",
                reason: "must be greater than zero".into(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::Invalid {
                key: "CHUNK_OVERLAP",
                reason: format!("overlap {chunk_overlap} must be smaller than chunk size {chunk_size}"),
            });
        }
        Ok(())
    }
}
