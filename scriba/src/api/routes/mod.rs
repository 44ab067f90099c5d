//! API route modules.
//!
//! Organizes routes by resource type.

pub mod config;
pub mod health;
pub mod sessions;
pub mod transcription;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;
use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/transcription", transcription::router())
        .nest("/api/sessions", sessions::router())
        .nest("/api/config", config::router())
        .nest("/health", health::router())
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
