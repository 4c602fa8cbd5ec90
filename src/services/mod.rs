pub mod config_service;
pub mod database_service;
pub mod error;
pub mod file_service;
pub mod reconcile;
pub mod record_service;

use std::sync::Arc;

use serde_json::Value;

use crate::config::ListingConfig;
use crate::filter::{Filter, Predicate};
use crate::permissions::{Action, Caller, PermissionGate};
use crate::repository::{DbHandler, HandlerKind, UUID_KEY};
use crate::schema::Config;
use crate::store::DocumentStore;
use crate::types::Document;

pub use error::MetaError;
pub use reconcile::{ChangeType, FieldChange, GroupReconciler, Level};

/// Everything a resource operation needs; shared by all requests.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn DocumentStore>,
    pub gate: Arc<dyn PermissionGate>,
    pub listing: ListingConfig,
}

impl ServiceContext {
    pub fn new(store: Arc<dyn DocumentStore>, gate: Arc<dyn PermissionGate>, listing: ListingConfig) -> Self {
        Self { store, gate, listing }
    }

    pub async fn require(&self, caller: &Caller, action: Action, database_id: &str) -> Result<(), MetaError> {
        crate::permissions::require(self.gate.as_ref(), caller, action, database_id).await
    }

    /// The registry row of `database_id`.
    pub async fn fetch_database(&self, database_id: &str) -> Result<Document, MetaError> {
        let mut handler = DbHandler::open(self.store.clone(), HandlerKind::Database, None).await?;
        let mut filter = Filter::new();
        filter.where_clause(Some(Predicate::eq("database_id", database_id)));
        handler.read(&filter).await?;
        single(handler.into_data(), || format!("Database \"{}\"", database_id))
    }

    /// Columns of `database_id` the caller may not see: whatever the gate
    /// hides plus secret columns unless the caller may read secrets.
    pub async fn hidden_columns(&self, caller: &Caller, database_id: &str, config: &Config) -> Result<Vec<String>, MetaError> {
        let mut hidden = self.gate.columns_to_filter(caller, database_id).await?;
        let secrets = config.secret_columns();
        if !secrets.is_empty()
            && !self.gate.is_permitted(caller, Action::MetadataReadSecret, database_id).await
        {
            hidden.extend(secrets);
        }
        Ok(hidden)
    }
}

/// Exactly one row, else `ObjectDoesNotExist` (none) or `InvalidObject`
/// (several).
pub(crate) fn single(rows: Vec<Document>, what: impl FnOnce() -> String) -> Result<Document, MetaError> {
    let count = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), count) {
        (Some(row), 1) => Ok(row),
        (None, _) => Err(MetaError::ObjectDoesNotExist(format!("{} does not exist", what()))),
        (Some(_), n) => Err(MetaError::InvalidObject(format!("{} matches {} rows", what(), n))),
    }
}

/// Copies the internal `_uuid` to the public `uuid` key.
pub(crate) fn expose_uuid(mut doc: Document) -> Document {
    if let Some(uuid) = doc.get(UUID_KEY).cloned() {
        doc.insert("uuid".to_string(), uuid);
    }
    doc
}

pub(crate) fn generate_record_id() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S-%3f").to_string()
}

pub(crate) fn string_field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_distinguishes_missing_and_duplicate() {
        let row = json!({"a": 1}).as_object().cloned().unwrap();
        assert!(single(vec![row.clone()], || "x".into()).is_ok());
        assert!(matches!(single(vec![], || "x".into()), Err(MetaError::ObjectDoesNotExist(_))));
        assert!(matches!(single(vec![row.clone(), row], || "x".into()), Err(MetaError::InvalidObject(_))));
    }

    #[test]
    fn record_id_format() {
        let id = generate_record_id();
        assert_eq!(id.len(), "20240101-120000-123".len());
        assert_eq!(&id[8..9], "-");
        assert!(crate::sanitize::require_clean(&id, crate::sanitize::Kind::Id, "id").is_ok());
    }

    #[tokio::test]
    async fn secret_columns_need_their_own_action() {
        use crate::schema::{Aggregation, ColumnSpec};
        use crate::testing::{context_with_gate, StaticGate};

        let mut config = Config::default();
        let mut secret = ColumnSpec::new("password", "string", Aggregation::First, "Password");
        secret.is_secret = Some(true);
        config.columns.push(secret);

        let caller = Caller::anonymous();
        let ctx = context_with_gate(StaticGate::default().hide("db", &["weather"]));
        let hidden = ctx.hidden_columns(&caller, "db", &config).await.unwrap();
        assert_eq!(hidden, vec!["weather".to_string(), "password".to_string()]);

        let ctx = context_with_gate(StaticGate::default().allow("db", &[Action::MetadataReadSecret]));
        assert!(ctx.hidden_columns(&caller, "db", &config).await.unwrap().is_empty());

        let ctx = context_with_gate(StaticGate { failing: true, ..Default::default() });
        assert!(matches!(
            ctx.hidden_columns(&caller, "db", &config).await,
            Err(MetaError::PermissionDenied(_))
        ));
    }

    #[test]
    fn uuid_is_exposed_alongside_internal_key() {
        let doc = expose_uuid(json!({"_uuid": "u1", "path": "/a"}).as_object().cloned().unwrap());
        assert_eq!(doc["uuid"], json!("u1"));
        assert_eq!(doc["_uuid"], json!("u1"));
    }
}
