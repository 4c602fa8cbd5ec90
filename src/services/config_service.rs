use crate::permissions::{Action, Caller};
use crate::repository::{DbHandler, HandlerKind};
use crate::sanitize;
use crate::schema::{self, Config};
use crate::types::Document;

use super::{MetaError, ServiceContext};

/// The schema of an existing database. Storage that was never written
/// reads as the empty default.
pub async fn get(ctx: &ServiceContext, caller: &Caller, database_id: &str) -> Result<Config, MetaError> {
    ctx.require(caller, Action::MetadataRead, database_id).await?;
    ctx.fetch_database(database_id).await?;

    let handler = DbHandler::open(ctx.store.clone(), HandlerKind::Config, Some(database_id)).await?;
    Ok(without_internal_keys(handler.config().clone()))
}

/// Validates `patch` against the stored schema, shallow-merges and persists.
pub async fn update(ctx: &ServiceContext, caller: &Caller, database_id: &str, patch: Document) -> Result<Config, MetaError> {
    ctx.require(caller, Action::DatabasesWriteUpdate, database_id).await?;
    ctx.fetch_database(database_id).await?;
    sanitize::validate_input_data(&patch)?;

    let mut handler = DbHandler::open(ctx.store.clone(), HandlerKind::Config, Some(database_id)).await?;
    schema::validate_patch(handler.config(), &patch)?;
    let merged = schema::merge(handler.config(), patch)?;
    handler.replace_config(merged.clone())?;
    handler.save().await?;

    tracing::info!("updated config of {:?} ({} column(s))", database_id, merged.columns.len());
    Ok(without_internal_keys(merged))
}

fn without_internal_keys(mut config: Config) -> Config {
    config.extra.retain(|k, _| !k.starts_with('_'));
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::META_TEMPLATE;
    use crate::testing::{context, doc, seeded_context};
    use serde_json::{json, Value};

    fn columns_with(extra: Option<Value>) -> Value {
        let mut columns = META_TEMPLATE.to_document()["columns"].as_array().cloned().unwrap();
        if let Some(extra) = extra {
            columns.push(extra);
        }
        Value::Array(columns)
    }

    #[tokio::test]
    async fn get_requires_database() {
        let ctx = context();
        let err = get(&ctx, &Caller::anonymous(), "missing").await.unwrap_err();
        assert!(matches!(err, MetaError::ObjectDoesNotExist(_)));
    }

    #[tokio::test]
    async fn add_column_and_keep_extra_keys() {
        let ctx = seeded_context().await;
        let caller = Caller::anonymous();
        let column = json!({"name": "weather", "dtype": "string", "aggregation": "first", "is_secret": true});
        let patch = doc(json!({"columns": columns_with(Some(column)), "title": "Runs"}));

        let updated = update(&ctx, &caller, "default", patch).await.unwrap();
        assert!(updated.column("weather").unwrap().is_secret());
        assert_eq!(updated.extra["title"], json!("Runs"));
        assert_eq!(updated.index_columns, vec!["record_id".to_string()]);
        assert_eq!(get(&ctx, &caller, "default").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn removing_a_column_writes_nothing() {
        let ctx = seeded_context().await;
        let caller = Caller::anonymous();
        let mut columns = columns_with(None);
        columns.as_array_mut().unwrap().pop();
        let err = update(&ctx, &caller, "default", doc(json!({"columns": columns}))).await.unwrap_err();
        assert!(matches!(err, MetaError::InvalidData(_)));
        assert_eq!(get(&ctx, &caller, "default").await.unwrap(), *META_TEMPLATE);

        let err = update(&ctx, &caller, "default", doc(json!({"index_columns": []}))).await.unwrap_err();
        assert!(matches!(err, MetaError::InvalidData(_)));
    }

    #[tokio::test]
    async fn internal_keys_never_reach_the_config() {
        let ctx = seeded_context().await;
        let caller = Caller::anonymous();
        for patch in [json!({"_internal": 1}), json!({".dot": 2}), json!({"title": "x", "bad key": 3})] {
            let err = update(&ctx, &caller, "default", doc(patch)).await.unwrap_err();
            assert!(matches!(err, MetaError::InvalidData(_)));
        }
        assert_eq!(get(&ctx, &caller, "default").await.unwrap(), *META_TEMPLATE);
    }

    #[tokio::test]
    async fn stored_internal_keys_are_not_returned() {
        use crate::store::{Collection, WriteOp};

        let ctx = seeded_context().await;
        let mut stored = META_TEMPLATE.to_document();
        stored.insert("_revision".to_string(), json!(7));
        let ops = vec![WriteOp::Overwrite { key: crate::repository::CONFIG_KEY.to_string(), doc: stored }];
        ctx.store.apply(&Collection::Config("default".to_string()), ops).await.unwrap();

        let config = get(&ctx, &Caller::anonymous(), "default").await.unwrap();
        assert!(config.extra.get("_revision").is_none());
    }
}
