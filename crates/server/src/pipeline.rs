//! Request pipeline: stage upload → extract → chunk → index → context →
//! generate → validate.
//!
//! Each stage reports a tagged `PipelineError` so the HTTP layer and the CLI
//! can tell failures apart without inspecting messages.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use mcqgen_core::config::{Config, ContextMode, PipelineConfig};
use mcqgen_ingest::document::chunker::{chunk_document, join_chunks};
use mcqgen_ingest::document::extract_pdf_file;
use mcqgen_ingest::{ChunkConfig, Embedder, ExtractionError, IndexState, RetrievalError};
use mcqgen_llm::{validate_mcqs, GenerationError, LlmError, Mcq, McqGenerator};

/// Input for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub pdf_bytes: Vec<u8>,
    pub num_mcqs: u32,
    /// Forces retrieval mode when set.
    pub query: Option<String>,
    /// Client-side filename, for logs only.
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub mcqs: String,
    pub chunk_count: usize,
    pub context_chars: usize,
    pub index_built: bool,
    pub context_mode: ContextMode,
    /// Parsed questions, present when output validation is enabled.
    pub questions: Option<Vec<Mcq>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("the PDF contains no extractable text")]
    EmptyDocument,
    #[error("indexing failed: {0}")]
    Indexing(String),
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable machine-readable tag used in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::EmptyDocument => "empty_document",
            PipelineError::Indexing(_) => "indexing",
            PipelineError::Retrieval(_) => "retrieval",
            PipelineError::Generation(_) => "generation",
            PipelineError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::EmptyDocument => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Stateless per-request orchestrator. Shared read-only across requests.
pub struct Pipeline {
    settings: PipelineConfig,
    chunk_config: ChunkConfig,
    batch_size: usize,
    upload_dir: Option<PathBuf>,
    embedder: Arc<dyn Embedder>,
    generator: Option<McqGenerator>,
    llm_provider: String,
}

impl Pipeline {
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, generator: Option<McqGenerator>) -> Self {
        Self {
            settings: config.pipeline.clone(),
            chunk_config: ChunkConfig::from_pipeline(&config.pipeline),
            batch_size: config.embedding.batch_size,
            upload_dir: config.server.upload_dir.clone(),
            embedder,
            generator,
            llm_provider: config.llm.provider.clone(),
        }
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineOutput, PipelineError> {
        let PipelineRequest {
            pdf_bytes,
            num_mcqs,
            query,
            filename,
        } = request;

        if num_mcqs == 0 || num_mcqs > self.settings.max_questions {
            return Err(PipelineError::InvalidRequest(format!(
                "num_mcqs must be between 1 and {}, got {}",
                self.settings.max_questions, num_mcqs
            )));
        }
        if pdf_bytes.is_empty() {
            return Err(PipelineError::InvalidRequest("uploaded PDF is empty".into()));
        }
        let generator = self.generator.as_ref().ok_or_else(|| {
            PipelineError::Generation(GenerationError::Provider(LlmError::NotConfigured(format!(
                "LLM provider '{}' has no credentials",
                self.llm_provider
            ))))
        })?;

        // The staged file lives until this function returns.
        let upload_dir = self.upload_dir.clone();
        let (_upload, mut doc) = tokio::task::spawn_blocking(move || {
            let upload = stage_upload(upload_dir.as_deref(), &pdf_bytes)?;
            let doc = extract_pdf_file(upload.path())?;
            Ok::<_, PipelineError>((upload, doc))
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("extraction task failed: {e}")))??;

        if let Some(name) = filename {
            doc.filename = name;
        }
        if doc.is_empty() {
            warn!("'{}' has no extractable text", doc.filename);
            return Err(PipelineError::EmptyDocument);
        }
        info!(
            "Extracted '{}': {} pages, {} chars",
            doc.filename,
            doc.pages.len(),
            doc.total_chars()
        );

        // Chunking and local embedding are CPU-bound and scale with the
        // upload, so both run on the blocking pool.
        let chunk_config = self.chunk_config.clone();
        let embedder = Arc::clone(&self.embedder);
        let batch_size = self.batch_size;
        let runtime = tokio::runtime::Handle::current();
        let (chunks, index) = tokio::task::spawn_blocking(move || {
            let chunks = chunk_document(&doc, &chunk_config);
            info!("Split into {} chunks", chunks.len());
            let index = runtime.block_on(IndexState::build(embedder.as_ref(), &chunks, batch_size));
            (chunks, index)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("indexing task failed: {e}")))?;
        if let IndexState::Built(built) = &index {
            if built.len() != chunks.len() {
                return Err(PipelineError::Indexing(format!(
                    "indexed {} of {} chunks",
                    built.len(),
                    chunks.len()
                )));
            }
        }

        let query = query.filter(|q| !q.trim().is_empty());
        let mode = if query.is_some() {
            ContextMode::Retrieval
        } else {
            self.settings.context_mode
        };
        let context = match mode {
            ContextMode::Full => join_chunks(&chunks, " "),
            ContextMode::Retrieval => {
                let query = query.as_deref().unwrap_or(&self.settings.retrieval_query);
                index
                    .retrieve(self.embedder.as_ref(), query, self.settings.top_k)
                    .await?
            }
        };
        let context_chars = context.chars().count();
        info!("Context: {} chars ({} mode)", context_chars, mode);

        let mcqs = generator.generate(num_mcqs, &context).await?;

        let (parsed, report) = validate_mcqs(&mcqs, num_mcqs);
        info!(
            "Generated MCQs: {}/{} parsed, complete={}",
            report.parsed, report.requested, report.complete
        );

        Ok(PipelineOutput {
            mcqs,
            chunk_count: chunks.len(),
            context_chars,
            index_built: index.is_built(),
            context_mode: mode,
            questions: self.settings.validate_output.then_some(parsed),
        })
    }
}

/// Write the upload to a named `.pdf` temp file, removed when dropped.
fn stage_upload(dir: Option<&Path>, bytes: &[u8]) -> Result<NamedTempFile, PipelineError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("mcqgen-").suffix(".pdf");
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| PipelineError::Internal(format!("failed to stage upload: {e}")))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| PipelineError::Internal(format!("failed to stage upload: {e}")))?;
    Ok(file)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mcqgen_ingest::document::test_pdf;
    use mcqgen_ingest::embedding::{EmbeddingError, HashingEmbedder};
    use mcqgen_llm::{GenerationSettings, LlmProvider, Message};

    pub(crate) const PARIS_MCQ: &str = "\
1. What is the capital of France?
A) Berlin
B) Paris
C) Rome
D) Madrid
Answer: B
Explanation: The document states that the capital of France is Paris.";

    /// Records prompts and how many staged files existed at call time.
    pub(crate) struct FakeLlm {
        reply: Option<String>,
        watch_dir: Option<PathBuf>,
        pub prompts: Mutex<Vec<String>>,
        pub staged_during_call: Mutex<Vec<usize>>,
    }

    impl FakeLlm {
        pub fn replying(reply: &str, watch_dir: Option<&Path>) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                watch_dir: watch_dir.map(Path::to_path_buf),
                prompts: Mutex::new(Vec::new()),
                staged_during_call: Mutex::new(Vec::new()),
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                watch_dir: None,
                prompts: Mutex::new(Vec::new()),
                staged_during_call: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for FakeLlm {
        async fn complete(
            &self,
            messages: Vec<Message>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, LlmError> {
            if let Some(dir) = &self.watch_dir {
                self.staged_during_call.lock().unwrap().push(count_files(dir));
            }
            self.prompts
                .lock()
                .unwrap()
                .extend(messages.into_iter().map(|m| m.content));
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(LlmError::ApiError { status: 503, body: "unavailable".into() }),
            }
        }

        fn name(&self) -> String {
            "fake/test".into()
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Api("embedding service down".into()))
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    /// Hashing embedder that notes which thread each batch ran on.
    struct ThreadTrackingEmbedder {
        inner: HashingEmbedder,
        threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    #[async_trait]
    impl Embedder for ThreadTrackingEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    pub(crate) fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|it| it.count()).unwrap_or(0)
    }

    pub(crate) fn test_config(upload_dir: &Path, extra: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("UPLOAD_DIR".into(), upload_dir.display().to_string());
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_map("", &vars)
    }

    pub(crate) fn test_pipeline(config: &Config, llm: Arc<FakeLlm>) -> Pipeline {
        let generator = McqGenerator::new(llm, GenerationSettings::default());
        Pipeline::new(config, Arc::new(HashingEmbedder::new(64)), Some(generator))
    }

    fn request(pdf_bytes: Vec<u8>, num_mcqs: u32) -> PipelineRequest {
        PipelineRequest {
            pdf_bytes,
            num_mcqs,
            query: None,
            filename: Some("paris.pdf".into()),
        }
    }

    fn paris_pdf() -> Vec<u8> {
        test_pdf::build(&["The capital of France is Paris."])
    }

    #[tokio::test]
    async fn paris_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[("MCQ_VALIDATE", "true")]);
        let llm = FakeLlm::replying(PARIS_MCQ, Some(dir.path()));
        let pipeline = test_pipeline(&config, llm.clone());

        let out = pipeline.run(request(paris_pdf(), 1)).await.unwrap();

        assert_eq!(out.mcqs, PARIS_MCQ);
        assert!(out.chunk_count >= 1);
        assert!(out.index_built);
        assert_eq!(out.context_mode, ContextMode::Full);

        let questions = out.questions.unwrap();
        assert_eq!(questions.len(), 1);
        assert!(questions[0].options.iter().any(|o| o.contains("Paris")));
        assert!(questions[0].explanation.is_some());

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The capital of France is Paris."));
        assert!(prompts[0].contains("generate 1 multiple-choice"));
    }

    #[tokio::test]
    async fn upload_is_staged_during_and_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let llm = FakeLlm::replying(PARIS_MCQ, Some(dir.path()));
        let pipeline = test_pipeline(&config, llm.clone());

        pipeline.run(request(paris_pdf(), 1)).await.unwrap();

        assert_eq!(*llm.staged_during_call.lock().unwrap(), vec![1]);
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn upload_is_removed_after_generation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let pipeline = test_pipeline(&config, FakeLlm::failing());

        let err = pipeline.run(request(paris_pdf(), 1)).await.unwrap_err();

        assert_eq!(err.kind(), "generation");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn unparsable_pdf_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let llm = FakeLlm::replying("unused", None);
        let pipeline = test_pipeline(&config, llm.clone());

        let err = pipeline
            .run(request(b"%PDF-1.4 not really a pdf".to_vec(), 1))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "extraction");
        assert_eq!(count_files(dir.path()), 0);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn textless_pdf_is_an_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let llm = FakeLlm::replying("unused", None);
        let pipeline = test_pipeline(&config, llm.clone());

        let err = pipeline.run(request(test_pdf::build(&[""]), 1)).await.unwrap_err();

        assert!(matches!(err, PipelineError::EmptyDocument));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(count_files(dir.path()), 0);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_questions_are_rejected_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let llm = FakeLlm::replying("unused", Some(dir.path()));
        let pipeline = test_pipeline(&config, llm.clone());

        let err = pipeline.run(request(paris_pdf(), 0)).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = pipeline.run(request(paris_pdf(), 51)).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");

        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_switches_to_retrieval() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let llm = FakeLlm::replying(PARIS_MCQ, None);
        let pipeline = test_pipeline(&config, llm.clone());

        let mut req = request(paris_pdf(), 1);
        req.query = Some("capital of France".into());
        let out = pipeline.run(req).await.unwrap();

        assert_eq!(out.context_mode, ContextMode::Retrieval);
        assert!(out.questions.is_none());
        assert!(llm.prompts.lock().unwrap()[0].contains("Paris"));
    }

    #[tokio::test]
    async fn index_failure_is_fatal_only_for_retrieval() {
        let dir = tempfile::tempdir().unwrap();

        let full = test_config(dir.path(), &[]);
        let generator = McqGenerator::new(FakeLlm::replying(PARIS_MCQ, None), GenerationSettings::default());
        let pipeline = Pipeline::new(&full, Arc::new(BrokenEmbedder), Some(generator));
        let out = pipeline.run(request(paris_pdf(), 1)).await.unwrap();
        assert!(!out.index_built);

        let retrieval = test_config(dir.path(), &[("CONTEXT_MODE", "retrieval")]);
        let generator = McqGenerator::new(FakeLlm::replying(PARIS_MCQ, None), GenerationSettings::default());
        let pipeline = Pipeline::new(&retrieval, Arc::new(BrokenEmbedder), Some(generator));
        let err = pipeline.run(request(paris_pdf(), 1)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(RetrievalError::IndexNotBuilt { .. })));
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn missing_generator_is_a_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let pipeline = Pipeline::new(&config, Arc::new(HashingEmbedder::new(16)), None);

        let err = pipeline.run(request(paris_pdf(), 1)).await.unwrap_err();
        assert_eq!(err.kind(), "generation");
        assert!(err.to_string().contains("gemini"));
    }

    #[tokio::test]
    async fn indexing_runs_off_the_request_thread() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let embedder = Arc::new(ThreadTrackingEmbedder {
            inner: HashingEmbedder::new(32),
            threads: Mutex::new(Vec::new()),
        });
        let generator = McqGenerator::new(FakeLlm::replying(PARIS_MCQ, None), GenerationSettings::default());
        let pipeline = Pipeline::new(&config, embedder.clone(), Some(generator));

        let out = pipeline.run(request(paris_pdf(), 1)).await.unwrap();
        assert!(out.index_built);

        let request_thread = std::thread::current().id();
        let threads = embedder.threads.lock().unwrap();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id != request_thread));
    }
}
