use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::error::ApiError;
use crate::permissions::Caller;
use crate::repository::ListResponse;
use crate::services::file_service;
use crate::types::Document;

use super::params::{clean_id, clean_uuid, JsonObject, ListQuery};

/// GET /databases/:database_id/files?record_id=... - `*` or no record_id lists all
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
    ListQuery(mut params): ListQuery,
) -> Result<Json<ListResponse>, ApiError> {
    let database_id = clean_id(&database_id)?;
    params.record_id = match params.record_id.take() {
        Some(id) if id != "*" => Some(clean_id(&id)?),
        other => other,
    };
    Ok(Json(file_service::list(&state.services, &caller, &database_id, &params).await?))
}

/// POST /databases/:database_id/files
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<Json<Document>, ApiError> {
    let database_id = clean_id(&database_id)?;
    Ok(Json(file_service::create(&state.services, &caller, &database_id, body).await?))
}

/// GET /databases/:database_id/files/:uuid
pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    Path((database_id, uuid)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    let (database_id, uuid) = (clean_id(&database_id)?, clean_uuid(&uuid)?);
    Ok(Json(file_service::get(&state.services, &caller, &database_id, &uuid).await?))
}

/// PATCH /databases/:database_id/files/:uuid
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path((database_id, uuid)): Path<(String, String)>,
    JsonObject(patch): JsonObject,
) -> Result<Json<Document>, ApiError> {
    let (database_id, uuid) = (clean_id(&database_id)?, clean_uuid(&uuid)?);
    Ok(Json(file_service::update(&state.services, &caller, &database_id, &uuid, patch).await?))
}

/// DELETE /databases/:database_id/files/:uuid
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path((database_id, uuid)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    let (database_id, uuid) = (clean_id(&database_id)?, clean_uuid(&uuid)?);
    Ok(Json(file_service::delete(&state.services, &caller, &database_id, &uuid).await?))
}
