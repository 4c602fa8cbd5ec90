use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::filter::Filter;
use crate::schema::{Config, DATABASE_REGISTRY_CONFIG};
use crate::services::MetaError;
use crate::store::{Collection, DocumentStore, WriteOp};
use crate::types::{Document, WriteStrategy};

/// Key of the single document in a config collection.
pub const CONFIG_KEY: &str = "config";

/// Internal row identifier of record and file rows.
pub const UUID_KEY: &str = "_uuid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// The database registry; rows keyed by `database_id`.
    Database,
    /// Meta rows of one database, read grouped by `record_id`.
    Record,
    /// Meta rows of one database, one row per file.
    File,
    /// The config document of one database.
    Config,
}

/// Buffered access to one collection: `read` fills the buffer, `add_data`
/// and `remove_data` queue writes, `save` flushes them as one batch.
pub struct DbHandler {
    store: Arc<dyn DocumentStore>,
    kind: HandlerKind,
    database_id: Option<String>,
    collection: Collection,
    config: Config,
    config_dirty: bool,
    data: Vec<Document>,
    count_total: usize,
    pending: Vec<WriteOp>,
}

impl DbHandler {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        kind: HandlerKind,
        database_id: Option<&str>,
    ) -> Result<Self, MetaError> {
        let (collection, config) = match kind {
            HandlerKind::Database => (Collection::Databases, DATABASE_REGISTRY_CONFIG.clone()),
            _ => {
                let db = database_id
                    .ok_or_else(|| MetaError::InvalidData("database_id is required".to_string()))?;
                let config = load_config(store.as_ref(), db).await?;
                let collection = match kind {
                    HandlerKind::Config => Collection::Config(db.to_string()),
                    _ => Collection::Meta(db.to_string()),
                };
                (collection, config)
            }
        };

        Ok(Self {
            store,
            kind,
            database_id: database_id.map(str::to_string),
            collection,
            config,
            config_dirty: false,
            data: vec![],
            count_total: 0,
            pending: vec![],
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn read(&mut self, filter: &Filter) -> Result<(), MetaError> {
        let result = self.store.query(&self.collection, filter).await?;
        tracing::debug!(
            "read {} of {} row(s) from {}",
            result.rows.len(),
            result.total,
            self.collection
        );
        self.data = result.rows;
        self.count_total = result.total;
        Ok(())
    }

    pub fn data(&self) -> &[Document] {
        &self.data
    }

    pub fn into_data(self) -> Vec<Document> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Matching rows (or groups) across all pages of the last read.
    pub fn count_total(&self) -> usize {
        self.count_total
    }

    /// Queues a write and returns the document as it will be stored.
    /// Record and file rows get a `_uuid` when missing, and any new key
    /// is registered as a column.
    pub fn add_data(&mut self, mut doc: Document, strategy: WriteStrategy) -> Result<Document, MetaError> {
        let key = match self.kind {
            HandlerKind::Database => doc
                .get("database_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .ok_or_else(|| MetaError::InvalidData("\"database_id\" is required".to_string()))?,
            HandlerKind::Record | HandlerKind::File => {
                let uuid = match doc.get(UUID_KEY).and_then(Value::as_str) {
                    Some(existing) => existing.to_string(),
                    None => Uuid::new_v4().to_string(),
                };
                doc.insert(UUID_KEY.to_string(), Value::String(uuid.clone()));
                if self.config.register_columns(&doc) {
                    self.config_dirty = true;
                }
                uuid
            }
            HandlerKind::Config => {
                self.config = Config::from_document(doc.clone())
                    .map_err(|e| MetaError::InvalidData(e.to_string()))?;
                CONFIG_KEY.to_string()
            }
        };

        self.pending.push(match strategy {
            WriteStrategy::Insert => WriteOp::Insert { key, doc: doc.clone() },
            WriteStrategy::Overwrite => WriteOp::Overwrite { key, doc: doc.clone() },
        });
        Ok(doc)
    }

    pub fn remove_data(&mut self, doc: &Document) -> Result<(), MetaError> {
        let key_field = match self.kind {
            HandlerKind::Database => "database_id",
            HandlerKind::Record | HandlerKind::File => UUID_KEY,
            HandlerKind::Config => {
                self.pending.push(WriteOp::Remove { key: CONFIG_KEY.to_string() });
                return Ok(());
            }
        };
        let key = doc
            .get(key_field)
            .and_then(Value::as_str)
            .ok_or_else(|| MetaError::InvalidObject(format!("Row without \"{}\" cannot be removed", key_field)))?;
        self.pending.push(WriteOp::Remove { key: key.to_string() });
        Ok(())
    }

    /// Replaces the schema; written on the next `save`.
    pub fn replace_config(&mut self, config: Config) -> Result<(), MetaError> {
        match self.kind {
            HandlerKind::Config => {
                self.add_data(config.to_document(), WriteStrategy::Overwrite)?;
            }
            HandlerKind::Record | HandlerKind::File => {
                self.config = config;
                self.config_dirty = true;
            }
            HandlerKind::Database => {
                return Err(MetaError::InvalidData("The database registry schema is fixed".to_string()));
            }
        }
        Ok(())
    }

    pub async fn save(&mut self) -> Result<(), MetaError> {
        let ops = std::mem::take(&mut self.pending);
        if !ops.is_empty() {
            self.store.apply(&self.collection, ops).await?;
        }

        if self.config_dirty {
            if let Some(db) = &self.database_id {
                let op = WriteOp::Overwrite {
                    key: CONFIG_KEY.to_string(),
                    doc: self.config.to_document(),
                };
                self.store.apply(&Collection::Config(db.clone()), vec![op]).await?;
            }
            self.config_dirty = false;
        }
        Ok(())
    }
}

async fn load_config(store: &dyn DocumentStore, database_id: &str) -> Result<Config, MetaError> {
    let result = store
        .query(&Collection::Config(database_id.to_string()), &Filter::new())
        .await?;
    match result.rows.len() {
        0 => Ok(Config::default()),
        1 => result.rows.into_iter().next().map(Config::from_document).unwrap_or_else(|| Ok(Config::default())),
        n => Err(MetaError::InvalidObject(format!(
            "Found {} config documents for \"{}\"",
            n, database_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Predicate;
    use crate::schema::META_TEMPLATE;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn missing_config_reads_as_default() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let handler = DbHandler::open(store, HandlerKind::Config, Some("fresh")).await.unwrap();
        assert!(handler.config().columns.is_empty());
        assert!(handler.config().index_columns.is_empty());
    }

    #[tokio::test]
    async fn record_rows_get_uuid_and_register_columns() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

        let mut config = DbHandler::open(store.clone(), HandlerKind::Config, Some("db")).await.unwrap();
        config.replace_config(META_TEMPLATE.clone()).unwrap();
        config.save().await.unwrap();

        let mut handler = DbHandler::open(store.clone(), HandlerKind::Record, Some("db")).await.unwrap();
        let stored = handler
            .add_data(doc(json!({"record_id": "r1", "weather": "sunny"})), WriteStrategy::Insert)
            .unwrap();
        assert!(stored.get(UUID_KEY).and_then(Value::as_str).is_some());
        handler.save().await.unwrap();

        let reopened = DbHandler::open(store.clone(), HandlerKind::File, Some("db")).await.unwrap();
        assert!(reopened.config().column("weather").is_some());
        assert!(reopened.config().column("record_id").is_some());

        let mut files = reopened;
        let mut filter = Filter::new();
        filter.where_clause(Some(Predicate::eq("record_id", "r1")));
        files.read(&filter).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files.count_total(), 1);
    }

    #[tokio::test]
    async fn registry_rows_need_database_id() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mut handler = DbHandler::open(store, HandlerKind::Database, None).await.unwrap();
        assert!(handler.add_data(doc(json!({"name": "x"})), WriteStrategy::Insert).is_err());
        assert!(handler.replace_config(Config::default()).is_err());
    }

    #[tokio::test]
    async fn corrupt_config_is_invalid_object() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        store
            .apply(
                &Collection::Config("db".into()),
                vec![WriteOp::Insert {
                    key: CONFIG_KEY.into(),
                    doc: doc(json!({"columns": "not a list"})),
                }],
            )
            .await
            .unwrap();
        let err = DbHandler::open(store, HandlerKind::Record, Some("db")).await.err().unwrap();
        assert!(matches!(err, MetaError::InvalidObject(_)));
    }
}
