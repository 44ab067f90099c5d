//! Settings routes backed by the config store.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};

use crate::api::error::ApiResult;
use crate::api::models::{ConfigResponse, ConfigUpdateRequest};
use crate::api::server::AppState;

/// Create the config router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_config).put(update_config))
}

/// Current settings, with the API key masked.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<ConfigResponse>> {
    let config = state.config_store.load()?;
    Ok(Json(ConfigResponse::from_config(&config)))
}

/// Apply a partial settings update and persist it.
#[utoipa::path(
    put,
    path = "/api/config",
    tag = "config",
    request_body = ConfigUpdateRequest,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse)
    )
)]
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdateRequest>,
) -> ApiResult<Json<ConfigResponse>> {
    let mut config = state.config_store.load()?;
    update.apply_to(&mut config);
    state.config_store.save(&config)?;
    Ok(Json(ConfigResponse::from_config(&config)))
}
