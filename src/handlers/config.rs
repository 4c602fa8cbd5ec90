use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::error::ApiError;
use crate::permissions::Caller;
use crate::schema::Config;
use crate::services::config_service;

use super::params::{clean_id, JsonObject};

/// GET /databases/:database_id/config
pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
) -> Result<Json<Config>, ApiError> {
    let database_id = clean_id(&database_id)?;
    Ok(Json(config_service::get(&state.services, &caller, &database_id).await?))
}

/// PATCH /databases/:database_id/config - Columns are append-only
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
    JsonObject(patch): JsonObject,
) -> Result<Json<Config>, ApiError> {
    let database_id = clean_id(&database_id)?;
    Ok(Json(config_service::update(&state.services, &caller, &database_id, patch).await?))
}
