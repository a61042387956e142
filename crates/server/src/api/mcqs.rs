use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use mcqgen_llm::Mcq;

use super::ApiError;
use crate::pipeline::{PipelineOutput, PipelineRequest};
use crate::state::AppState;

// ── Request/Response types ────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GenerateResponse {
    /// Model output, verbatim apart from trimming.
    pub mcqs: String,
    pub chunk_count: usize,
    pub context_chars: usize,
    pub index_built: bool,
    /// `full` or `retrieval`.
    pub context_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub questions: Option<Vec<Mcq>>,
}

impl From<PipelineOutput> for GenerateResponse {
    fn from(out: PipelineOutput) -> Self {
        Self {
            mcqs: out.mcqs,
            chunk_count: out.chunk_count,
            context_chars: out.context_chars,
            index_built: out.index_built,
            context_mode: out.context_mode.to_string(),
            questions: out.questions,
        }
    }
}

// ── POST /generate-mcqs/ ──────────────────────────

/// Generate multiple-choice questions from a PDF
///
/// Accepts multipart/form-data with a `pdf` file and a `num_mcqs` count. The
/// document is extracted, chunked and indexed, and the selected context is
/// sent to the configured LLM.
#[utoipa::path(
    post,
    path = "/generate-mcqs/",
    tag = "MCQ",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields: `pdf` (file), `num_mcqs` (integer), optional `query` (text)"
    ),
    responses(
        (status = 200, description = "Questions generated", body = GenerateResponse),
        (status = 400, description = "Missing or invalid form fields", body = super::ErrorResponse),
        (status = 422, description = "PDF has no extractable text", body = super::ErrorResponse),
        (status = 500, description = "Pipeline failure", body = super::ErrorResponse)
    )
)]
pub async fn generate_mcqs(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let request = read_form(multipart).await?;
    info!(
        %request_id,
        "generate-mcqs: {} bytes, num_mcqs={}",
        request.pdf_bytes.len(),
        request.num_mcqs
    );

    match state.pipeline.run(request).await {
        Ok(output) => Ok(Json(output.into())),
        Err(e) => {
            warn!(%request_id, kind = e.kind(), "generate-mcqs failed: {}", e);
            Err(e.into())
        }
    }
}

/// Collect the `pdf`, `num_mcqs` and `query` fields; others are ignored.
async fn read_form(mut multipart: Multipart) -> Result<PipelineRequest, ApiError> {
    let mut pdf: Option<(Vec<u8>, Option<String>)> = None;
    let mut num_mcqs: Option<u32> = None;
    let mut query: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "pdf" => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                pdf = Some((bytes.to_vec(), filename));
            }
            "num_mcqs" => {
                let raw = field.text().await?;
                let parsed = raw.trim().parse::<u32>().map_err(|_| {
                    ApiError::bad_request(format!("num_mcqs must be a positive integer, got '{}'", raw.trim()))
                })?;
                num_mcqs = Some(parsed);
            }
            "query" => query = Some(field.text().await?),
            _ => {}
        }
    }

    let (pdf_bytes, filename) = pdf.ok_or_else(|| ApiError::bad_request("missing 'pdf' file field"))?;
    let num_mcqs = num_mcqs.ok_or_else(|| ApiError::bad_request("missing 'num_mcqs' field"))?;

    Ok(PipelineRequest {
        pdf_bytes,
        num_mcqs,
        query,
        filename,
    })
}
