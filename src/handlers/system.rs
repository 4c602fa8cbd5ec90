use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "metastore-api",
        "version": version,
        "environment": state.config.environment,
        "endpoints": {
            "databases": "/databases[/:database_id]",
            "config": "/databases/:database_id/config",
            "records": "/databases/:database_id/records[/:record_id]",
            "files": "/databases/:database_id/files[/:uuid]",
            "health": "/healthz",
        }
    }))
}

pub async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.services.store.health_check().await {
        Ok(()) => Ok(Json(json!("ok"))),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            Err(ApiError::service_unavailable(format!("store unavailable: {}", e)))
        }
    }
}

/// GET /echo/:content/:resp_type - `json` wraps the content, anything else returns it as text
pub async fn echo(Path((content, resp_type)): Path<(String, String)>) -> Response {
    if resp_type == "json" {
        Json(json!({ "content": content })).into_response()
    } else {
        content.into_response()
    }
}
