use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::error::ApiError;
use crate::permissions::Caller;
use crate::repository::ListResponse;
use crate::services::record_service;
use crate::types::Document;

use super::params::{clean_id, JsonObject, ListQuery};

/// GET /databases/:database_id/records - Grouped record listing
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
    ListQuery(params): ListQuery,
) -> Result<Json<ListResponse>, ApiError> {
    let database_id = clean_id(&database_id)?;
    Ok(Json(record_service::list(&state.services, &caller, &database_id, &params).await?))
}

/// POST /databases/:database_id/records
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Path(database_id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<Json<Document>, ApiError> {
    let database_id = clean_id(&database_id)?;
    Ok(Json(record_service::create(&state.services, &caller, &database_id, body).await?))
}

/// GET /databases/:database_id/records/:record_id
pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    Path((database_id, record_id)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    let (database_id, record_id) = (clean_id(&database_id)?, clean_id(&record_id)?);
    Ok(Json(record_service::get(&state.services, &caller, &database_id, &record_id).await?))
}

/// PATCH /databases/:database_id/records/:record_id - Patch every row of the record
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path((database_id, record_id)): Path<(String, String)>,
    JsonObject(patch): JsonObject,
) -> Result<Json<Document>, ApiError> {
    let (database_id, record_id) = (clean_id(&database_id)?, clean_id(&record_id)?);
    let record = record_service::update(&state.services, &caller, &database_id, &record_id, patch).await?;
    Ok(Json(record))
}

/// DELETE /databases/:database_id/records/:record_id
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path((database_id, record_id)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    let (database_id, record_id) = (clean_id(&database_id)?, clean_id(&record_id)?);
    Ok(Json(record_service::delete(&state.services, &caller, &database_id, &record_id).await?))
}
