//! Records: every meta row sharing a `record_id`, read back as one document
//! collapsed by the config's aggregations.

use serde_json::Value;

use crate::filter::{Filter, Predicate};
use crate::permissions::{Action, Caller};
use crate::repository::{DbHandler, HandlerKind, ListParams, ListResponse};
use crate::sanitize::{self, filter_output, Kind};
use crate::types::{Document, WriteStrategy};

use super::{generate_record_id, single, GroupReconciler, Level, MetaError, ServiceContext};

pub(crate) const RECORD_KEY: &str = "record_id";

pub async fn list(
    ctx: &ServiceContext,
    caller: &Caller,
    database_id: &str,
    params: &ListParams,
) -> Result<ListResponse, MetaError> {
    ctx.require(caller, Action::MetadataRead, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let window = params.window(&ctx.listing)?;
    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Record, Some(database_id)).await?;
    let config = handler.config().clone();
    let (mut filter, sort_key) = params.to_filter(RECORD_KEY, &config.column_names(), None)?;
    filter
        .group_by(config.group_by(RECORD_KEY))
        .limit(window.per_page, Some(window.offset()))?;
    handler.read(&filter).await?;

    let hidden = ctx.hidden_columns(caller, database_id, &config).await?;
    let total = handler.count_total();
    let data = handler.into_data().into_iter().map(|d| filter_output(d, &hidden)).collect();
    Ok(ListResponse::new(data, window, sort_key, total))
}

/// Adds a record. Without a `record_id` one is generated from the clock.
pub async fn create(ctx: &ServiceContext, caller: &Caller, database_id: &str, mut data: Document) -> Result<Document, MetaError> {
    sanitize::validate_input_data(&data)?;
    ctx.require(caller, Action::MetadataWriteAdd, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let record_id = match data.get(RECORD_KEY) {
        None | Some(Value::Null) => generate_record_id(),
        Some(Value::String(id)) if !id.is_empty() => sanitize::require_clean(id, Kind::Id, RECORD_KEY)?,
        Some(other) => {
            return Err(MetaError::InvalidData(format!("\"record_id\" must be a non-empty string, got {}", other)))
        }
    };
    data.insert(RECORD_KEY.to_string(), Value::String(record_id.clone()));

    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Record, Some(database_id)).await?;
    handler.read(&by_record(&record_id)).await?;
    if !handler.is_empty() {
        return Err(MetaError::ObjectExists(format!("Record \"{}\" already exists", record_id)));
    }
    let stored = handler.add_data(data, WriteStrategy::Insert)?;
    handler.save().await?;

    tracing::debug!("created record {:?} in {:?}", record_id, database_id);
    let hidden = ctx.hidden_columns(caller, database_id, handler.config()).await?;
    Ok(filter_output(stored, &hidden))
}

pub async fn get(ctx: &ServiceContext, caller: &Caller, database_id: &str, record_id: &str) -> Result<Document, MetaError> {
    ctx.require(caller, Action::MetadataRead, database_id).await?;
    ctx.fetch_database(database_id).await?;
    fetch_grouped(ctx, caller, database_id, record_id).await
}

/// Patches every row of the record. Only columns aggregated with `first`
/// (or not yet known) may change, and never an index column.
///
/// This is a read-modify-write without locking: two concurrent patches of
/// the same record race and the last `save` wins for the keys they share.
pub async fn update(
    ctx: &ServiceContext,
    caller: &Caller,
    database_id: &str,
    record_id: &str,
    patch: Document,
) -> Result<Document, MetaError> {
    sanitize::validate_input_data(&patch)?;
    ctx.require(caller, Action::MetadataWriteUpdate, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Record, Some(database_id)).await?;
    handler.read(&by_record(record_id)).await?;
    if handler.is_empty() {
        return Err(not_found(record_id));
    }

    let config = handler.config().clone();
    let reconciler = GroupReconciler::new(&config, Level::Record);
    let rows = handler.data().to_vec();
    let changes = reconciler.plan(&rows, &patch)?;
    if !changes.is_empty() {
        for row in reconciler.apply(rows, &patch) {
            handler.add_data(row, WriteStrategy::Overwrite)?;
        }
        handler.save().await?;
    }

    fetch_grouped(ctx, caller, database_id, record_id).await
}

/// Removes every row of the record.
pub async fn delete(ctx: &ServiceContext, caller: &Caller, database_id: &str, record_id: &str) -> Result<Document, MetaError> {
    ctx.require(caller, Action::MetadataWriteDelete, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Record, Some(database_id)).await?;
    handler.read(&by_record(record_id)).await?;
    if handler.is_empty() {
        return Err(not_found(record_id));
    }
    let rows = handler.data().to_vec();
    for row in &rows {
        handler.remove_data(row)?;
    }
    handler.save().await?;
    tracing::debug!("deleted record {:?} ({} row(s)) from {:?}", record_id, rows.len(), database_id);

    let mut response = Document::new();
    response.insert("database_id".to_string(), Value::String(database_id.to_string()));
    response.insert(RECORD_KEY.to_string(), Value::String(record_id.to_string()));
    Ok(response)
}

fn by_record(record_id: &str) -> Filter {
    let mut filter = Filter::new();
    filter.where_clause(Some(Predicate::eq(RECORD_KEY, record_id)));
    filter
}

fn not_found(record_id: &str) -> MetaError {
    MetaError::ObjectDoesNotExist(format!("Record \"{}\" does not exist", record_id))
}

async fn fetch_grouped(ctx: &ServiceContext, caller: &Caller, database_id: &str, record_id: &str) -> Result<Document, MetaError> {
    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Record, Some(database_id)).await?;
    let config = handler.config().clone();
    let mut filter = by_record(record_id);
    filter.group_by(config.group_by(RECORD_KEY));
    handler.read(&filter).await?;

    let record = single(handler.into_data(), || format!("Record \"{}\"", record_id))?;
    let hidden = ctx.hidden_columns(caller, database_id, &config).await?;
    Ok(filter_output(record, &hidden))
}
