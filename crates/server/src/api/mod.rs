//! HTTP API handlers.
//!
//! Shared response types and the error mapping live here in mod.rs.

pub mod doc;
mod health;
mod mcqs;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::PipelineError;

// ── Shared types ─────────────────────────────────────────────────

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// One of `invalid_request`, `empty_document`, `extraction`, `indexing`,
    /// `retrieval`, `generation`, `internal`.
    pub kind: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request",
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self {
            status: err.status(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self {
            status: err.status(),
            kind: "invalid_request",
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::health;
pub use mcqs::{generate_mcqs, GenerateResponse};
