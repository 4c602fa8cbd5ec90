use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::aggregate;
use super::traits::{Collection, DocumentStore, QueryResult, StoreError, WriteOp};
use crate::filter::Filter;
use crate::types::Document;

/// Process-local store. Rows keep insertion order within a collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<(String, Document)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, collection: &Collection, filter: &Filter) -> Result<QueryResult, StoreError> {
        let rows = {
            let collections = self.collections.read().await;
            collections
                .get(collection)
                .map(|rows| rows.iter().map(|(_, doc)| doc.clone()).collect())
                .unwrap_or_default()
        };
        aggregate::execute(rows, filter)
    }

    async fn apply(&self, collection: &Collection, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let rows = collections.entry(collection.clone()).or_default();

        let mut taken: HashSet<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        for op in &ops {
            match op {
                WriteOp::Insert { key, .. } => {
                    if !taken.insert(key.as_str()) {
                        return Err(StoreError::Conflict {
                            collection: collection.to_string(),
                            key: key.clone(),
                        });
                    }
                }
                WriteOp::Overwrite { key, .. } => {
                    taken.insert(key.as_str());
                }
                WriteOp::Remove { key } => {
                    taken.remove(key.as_str());
                }
            }
        }

        for op in ops {
            match op {
                WriteOp::Insert { key, doc } | WriteOp::Overwrite { key, doc } => {
                    match rows.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = doc,
                        None => rows.push((key, doc)),
                    }
                }
                WriteOp::Remove { key } => rows.retain(|(k, _)| *k != key),
            }
        }
        Ok(())
    }

    async fn drop_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
