//! OpenAPI documentation configuration.
//!
//! Aggregates the documented endpoints and schemas for Swagger UI.

use utoipa::OpenApi;

use crate::api::error::ApiErrorResponse;
use crate::api::models::{
    ConfigResponse, ConfigUpdateRequest, FileSpecRequest, HealthResponse, SessionResponse,
    StartTranscriptionRequest, StartTranscriptionResponse,
};
use crate::pipeline::{Job, JobStatus, SessionPhase};

/// OpenAPI documentation for the scriba API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "scriba API",
        description = "Batch media transcription and export with live progress streaming"
    ),
    paths(
        crate::api::routes::transcription::start_transcription,
        crate::api::routes::transcription::progress_stream,
        crate::api::routes::sessions::get_session,
        crate::api::routes::config::get_config,
        crate::api::routes::config::update_config,
        crate::api::routes::health::health_check,
    ),
    components(schemas(
        ApiErrorResponse,
        ConfigResponse,
        ConfigUpdateRequest,
        FileSpecRequest,
        HealthResponse,
        Job,
        JobStatus,
        SessionPhase,
        SessionResponse,
        StartTranscriptionRequest,
        StartTranscriptionResponse,
    )),
    tags(
        (name = "transcription", description = "Start sessions and stream progress"),
        (name = "sessions", description = "Session state inspection"),
        (name = "config", description = "Settings"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().expect("OpenAPI document must serialize");
        assert!(json.contains("/api/transcription/start"));
        assert!(json.contains("/api/sessions/{id}"));
    }
}
