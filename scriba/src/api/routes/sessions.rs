//! Session inspection routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::api::error::ApiResult;
use crate::api::models::SessionResponse;
use crate::api::server::AppState;

/// Create the sessions router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_session))
}

/// Get a session snapshot: phase and full job records. Useful for reading
/// the terminal state after the stream has ended.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionResponse),
        (status = 404, description = "Session not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.sessions.get(&id)?;
    Ok(Json(SessionResponse {
        id: session.id().to_string(),
        phase: session.phase(),
        jobs: session.jobs(),
    }))
}
