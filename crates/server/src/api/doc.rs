//! OpenAPI documentation aggregator.
//!
//! Collects the `#[utoipa::path]`-annotated handlers and `ToSchema`-derived
//! types into a single OpenAPI spec, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "mcqgen API",
        version = "0.1.0",
        description = "Generate multiple-choice questions from uploaded PDF documents.",
    ),
    tags(
        (name = "Health", description = "Server readiness and configured providers"),
        (name = "MCQ", description = "PDF upload and question generation"),
    ),
    paths(
        crate::api::health::health,
        crate::api::mcqs::generate_mcqs,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::health::HealthResponse,
        crate::api::mcqs::GenerateResponse,
    ))
)]
pub struct ApiDoc;
