use serde_json::Value;

use crate::filter::{Filter, Predicate};
use crate::permissions::{Action, Caller};
use crate::repository::{DbHandler, HandlerKind, ListParams, ListResponse, UUID_KEY};
use crate::sanitize::{self, filter_output, Kind};
use crate::types::{Document, WriteStrategy};

use super::record_service::RECORD_KEY;
use super::{expose_uuid, single, string_field, GroupReconciler, Level, MetaError, ServiceContext};

const PATH_KEY: &str = "path";

/// Files of one record, or of every record when `record_id` is omitted or `*`.
pub async fn list(
    ctx: &ServiceContext,
    caller: &Caller,
    database_id: &str,
    params: &ListParams,
) -> Result<ListResponse, MetaError> {
    ctx.require(caller, Action::MetadataRead, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let window = params.window(&ctx.listing)?;
    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::File, Some(database_id)).await?;
    let config = handler.config().clone();
    let owner = match params.record_id.as_deref() {
        None | Some("*") => None,
        Some(record_id) => Some(Predicate::eq(RECORD_KEY, record_id)),
    };
    let (mut filter, sort_key) = params.to_filter(PATH_KEY, &config.column_names(), owner)?;
    filter.limit(window.per_page, Some(window.offset()))?;
    handler.read(&filter).await?;

    let hidden = ctx.hidden_columns(caller, database_id, &config).await?;
    let total = handler.count_total();
    let data = handler
        .into_data()
        .into_iter()
        .map(|d| filter_output(expose_uuid(d), &hidden))
        .collect();
    Ok(ListResponse::new(data, window, sort_key, total))
}

/// Adds a file row to a record. `record_id` and `path` are required and a
/// record holds at most one file per path.
pub async fn create(ctx: &ServiceContext, caller: &Caller, database_id: &str, data: Document) -> Result<Document, MetaError> {
    sanitize::validate_input_data(&data)?;
    ctx.require(caller, Action::MetadataWriteAdd, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let record_id = required(&data, RECORD_KEY)?;
    let record_id = sanitize::require_clean(record_id, Kind::Id, RECORD_KEY)?;
    let path = required(&data, PATH_KEY)?.to_string();

    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::File, Some(database_id)).await?;
    let mut filter = Filter::new();
    filter.where_clause(Predicate::and(
        Some(Predicate::eq(RECORD_KEY, record_id.as_str())),
        Some(Predicate::eq(PATH_KEY, path.as_str())),
    ));
    handler.read(&filter).await?;
    if !handler.is_empty() {
        return Err(MetaError::ObjectExists(format!(
            "File \"{}\" already exists in record \"{}\"",
            path, record_id
        )));
    }

    let stored = handler.add_data(data, WriteStrategy::Insert)?;
    handler.save().await?;
    tracing::debug!("created file {:?} in record {:?}", path, record_id);

    let hidden = ctx.hidden_columns(caller, database_id, handler.config()).await?;
    Ok(filter_output(expose_uuid(stored), &hidden))
}

pub async fn get(ctx: &ServiceContext, caller: &Caller, database_id: &str, uuid: &str) -> Result<Document, MetaError> {
    ctx.require(caller, Action::MetadataRead, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let (handler, row) = fetch(ctx, database_id, uuid).await?;
    let hidden = ctx.hidden_columns(caller, database_id, handler.config()).await?;
    Ok(filter_output(expose_uuid(row), &hidden))
}

/// Patches one file row. Index columns stay fixed; everything else,
/// `path` included, may change.
pub async fn update(
    ctx: &ServiceContext,
    caller: &Caller,
    database_id: &str,
    uuid: &str,
    patch: Document,
) -> Result<Document, MetaError> {
    sanitize::validate_input_data(&patch)?;
    ctx.require(caller, Action::MetadataWriteUpdate, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let (mut handler, row) = fetch(ctx, database_id, uuid).await?;
    let config = handler.config().clone();
    let reconciler = GroupReconciler::new(&config, Level::File);
    let rows = vec![row];
    reconciler.plan(&rows, &patch)?;

    let row = reconciler.apply(rows, &patch).into_iter().next().unwrap_or_default();
    let updated = handler.add_data(row, WriteStrategy::Overwrite)?;
    handler.save().await?;

    let hidden = ctx.hidden_columns(caller, database_id, handler.config()).await?;
    Ok(filter_output(expose_uuid(updated), &hidden))
}

pub async fn delete(ctx: &ServiceContext, caller: &Caller, database_id: &str, uuid: &str) -> Result<Document, MetaError> {
    ctx.require(caller, Action::MetadataWriteDelete, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let (mut handler, row) = fetch(ctx, database_id, uuid).await?;
    handler.remove_data(&row)?;
    handler.save().await?;

    let mut response = Document::new();
    response.insert("database_id".to_string(), Value::String(database_id.to_string()));
    response.insert("uuid".to_string(), Value::String(uuid.to_string()));
    Ok(response)
}

fn required<'a>(data: &'a Document, key: &str) -> Result<&'a str, MetaError> {
    string_field(data, key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MetaError::InvalidData(format!("\"{}\" is required", key)))
}

async fn fetch(ctx: &ServiceContext, database_id: &str, uuid: &str) -> Result<(DbHandler, Document), MetaError> {
    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::File, Some(database_id)).await?;
    let mut filter = Filter::new();
    filter.where_clause(Some(Predicate::eq(UUID_KEY, uuid)));
    handler.read(&filter).await?;
    let row = single(handler.data().to_vec(), || format!("File \"{}\"", uuid))?;
    Ok((handler, row))
}
