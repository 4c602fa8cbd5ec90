use serde_json::Value;

use crate::permissions::{Action, Caller};
use crate::repository::{DbHandler, HandlerKind, ListParams, ListResponse};
use crate::sanitize::{self, filter_output, Kind};
use crate::schema::{DATABASE_REGISTRY_CONFIG, META_TEMPLATE};
use crate::store::Collection;
use crate::types::{Document, WriteStrategy};

use super::{string_field, MetaError, ServiceContext};

const DEFAULT_KEY: &str = "database_id";

pub async fn list(ctx: &ServiceContext, caller: &Caller, params: &ListParams) -> Result<ListResponse, MetaError> {
    let window = params.window(&ctx.listing)?;
    let (mut filter, sort_key) = params.to_filter(DEFAULT_KEY, &DATABASE_REGISTRY_CONFIG.column_names(), None)?;
    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Database, None).await?;

    if !ctx.gate.is_enforced() {
        filter.limit(window.per_page, Some(window.offset()))?;
        handler.read(&filter).await?;
        let total = handler.count_total();
        let data = handler.into_data().into_iter().map(|d| filter_output(d, &[])).collect();
        return Ok(ListResponse::new(data, window, sort_key, total));
    }

    // Pagination has to follow the per-database permission filter.
    handler.read(&filter).await?;
    let rows = handler.into_data();
    let ids = rows
        .iter()
        .filter_map(|r| string_field(r, DEFAULT_KEY).map(str::to_string))
        .collect();
    let permitted = ctx.gate.filter_permitted_databases(caller, ids).await;
    let rows = rows
        .into_iter()
        .filter(|r| string_field(r, DEFAULT_KEY).map_or(false, |id| permitted.iter().any(|p| p == id)))
        .collect();
    Ok(ListResponse::paginate(rows, window, sort_key).map_data(|d| filter_output(d, &[])))
}

/// Registers a database and writes its default config.
pub async fn create(ctx: &ServiceContext, caller: &Caller, data: Document) -> Result<Document, MetaError> {
    sanitize::validate_input_data(&data)?;
    let database_id = string_field(&data, DEFAULT_KEY)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| MetaError::InvalidData("\"database_id\" is required".to_string()))?;
    let database_id = sanitize::require_clean(database_id, Kind::Id, "database_id")?;
    ctx.require(caller, Action::DatabasesWriteAdd, &database_id).await?;

    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Database, None).await?;
    let stored = handler.add_data(data, WriteStrategy::Insert)?;
    handler.save().await?;

    let mut config = DbHandler::open(ctx.store.clone(), HandlerKind::Config, Some(&database_id)).await?;
    config.replace_config(META_TEMPLATE.clone())?;
    config.save().await?;

    tracing::info!("created database {:?}", database_id);
    Ok(filter_output(stored, &[]))
}

pub async fn get(ctx: &ServiceContext, caller: &Caller, database_id: &str) -> Result<Document, MetaError> {
    ctx.require(caller, Action::DatabasesRead, database_id).await?;
    let row = ctx.fetch_database(database_id).await?;
    Ok(filter_output(row, &[]))
}

/// Merges `patch` into the stored row; keys absent from the patch are kept.
pub async fn update(ctx: &ServiceContext, caller: &Caller, database_id: &str, patch: Document) -> Result<Document, MetaError> {
    sanitize::validate_input_data(&patch)?;
    if let Some(id) = patch.get(DEFAULT_KEY) {
        if id.as_str() != Some(database_id) {
            return Err(MetaError::InvalidData(format!(
                "\"database_id\" cannot be changed (got {}, expected {:?})",
                id, database_id
            )));
        }
    }
    ctx.require(caller, Action::DatabasesWriteUpdate, database_id).await?;

    let mut row = ctx.fetch_database(database_id).await?;
    row.extend(patch);

    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Database, None).await?;
    let stored = handler.add_data(row, WriteStrategy::Overwrite)?;
    handler.save().await?;
    Ok(filter_output(stored, &[]))
}

/// Removes the registry row, then the database's rows and config.
pub async fn delete(ctx: &ServiceContext, caller: &Caller, database_id: &str) -> Result<Document, MetaError> {
    ctx.require(caller, Action::DatabasesWriteDelete, database_id).await?;
    let row = ctx.fetch_database(database_id).await?;

    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Database, None).await?;
    handler.remove_data(&row)?;
    handler.save().await?;

    ctx.store.drop_collection(&Collection::Meta(database_id.to_string())).await?;
    ctx.store.drop_collection(&Collection::Config(database_id.to_string())).await?;

    tracing::info!("deleted database {:?}", database_id);
    let mut response = Document::new();
    response.insert(DEFAULT_KEY.to_string(), Value::String(database_id.to_string()));
    Ok(response)
}
