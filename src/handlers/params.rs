//! Request extractors shared by the resource handlers.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde_json::Value;

use crate::error::ApiError;
use crate::repository::ListParams;
use crate::sanitize::{self, Kind};
use crate::types::Document;

/// List query string: `sort_key`, `sort_order`, `per_page`, `page`,
/// `search`, `search_key` (repeatable, also as `search_key[]`) and, for
/// files, `record_id`.
#[derive(Debug, Clone)]
pub struct ListQuery(pub ListParams);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ListQuery {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_list_query(parts.uri.query().unwrap_or_default()).map(ListQuery)
    }
}

pub fn parse_list_query(query: &str) -> Result<ListParams, ApiError> {
    let mut params = ListParams::default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "sort_key" => params.sort_key = Some(value.into_owned()),
            "sort_order" => params.sort_order = number(&key, &value)?,
            "per_page" => params.per_page = Some(number(&key, &value)?),
            "page" => params.page = number(&key, &value)?,
            // Stray characters are dropped, not rejected.
            "search" => params.search = Some(sanitize::sanitize_search(&value)),
            "search_key" | "search_key[]" => {
                let column = sanitize::require_clean(&value, Kind::Key, "search_key")?;
                params.search_keys.push(column);
            }
            "record_id" => params.record_id = Some(value.into_owned()),
            other => tracing::debug!("ignoring query parameter {:?}", other),
        }
    }
    Ok(params)
}

fn number(key: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("\"{}\" must be an integer, got {:?}", key, value)))
}

/// Path identifier (`database_id`, `record_id`) that must already be clean.
pub fn clean_id(value: &str) -> Result<String, ApiError> {
    Ok(sanitize::require_clean(value, Kind::Id, "identifier")?)
}

pub fn clean_uuid(value: &str) -> Result<String, ApiError> {
    Ok(sanitize::require_clean(value, Kind::Uuid, "uuid")?)
}

/// JSON request body that has to be an object.
#[derive(Debug, Clone)]
pub struct JsonObject(pub Document);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for JsonObject {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::invalid_json(rejection.body_text()))?;
        match value {
            Value::Object(map) => Ok(JsonObject(map)),
            other => Err(ApiError::bad_request(format!("Request body must be a JSON object, got {}", other))),
        }
    }
}
