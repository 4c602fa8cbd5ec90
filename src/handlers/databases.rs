use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::error::ApiError;
use crate::permissions::Caller;
use crate::repository::ListResponse;
use crate::services::database_service;
use crate::types::Document;

use super::params::{clean_id, JsonObject, ListQuery};

/// GET /databases - List databases the caller may read
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    ListQuery(params): ListQuery,
) -> Result<Json<ListResponse>, ApiError> {
    let page = database_service::list(&state.services, &caller, &params).await?;
    Ok(Json(page))
}

/// POST /databases - Register a database
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    JsonObject(body): JsonObject,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(database_service::create(&state.services, &caller, body).await?))
}

/// GET /databases/:database_id
pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let database_id = clean_id(&database_id)?;
    Ok(Json(database_service::get(&state.services, &caller, &database_id).await?))
}

/// PATCH /databases/:database_id - Merge a partial document
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
    JsonObject(patch): JsonObject,
) -> Result<Json<Document>, ApiError> {
    let database_id = clean_id(&database_id)?;
    Ok(Json(database_service::update(&state.services, &caller, &database_id, patch).await?))
}

/// DELETE /databases/:database_id
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let database_id = clean_id(&database_id)?;
    Ok(Json(database_service::delete(&state.services, &caller, &database_id).await?))
}
