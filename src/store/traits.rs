use std::fmt;

use thiserror::Error;

use crate::filter::{Filter, FilterError};
use crate::types::Document;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("\"{key}\" already exists in {collection}")]
    Conflict { collection: String, key: String },

    #[error("Corrupt document: {0}")]
    Corrupt(String),

    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// A named group of documents inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Registry of databases, keyed by `database_id`.
    Databases,
    /// Record and file rows of one database, keyed by `_uuid`.
    Meta(String),
    /// The single config document of one database.
    Config(String),
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Databases => write!(f, "databases"),
            Collection::Meta(db) => write!(f, "meta:{}", db),
            Collection::Config(db) => write!(f, "config:{}", db),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Fails with [`StoreError::Conflict`] when the key is taken.
    Insert { key: String, doc: Document },
    Overwrite { key: String, doc: Document },
    Remove { key: String },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Insert { key, .. } | WriteOp::Overwrite { key, .. } | WriteOp::Remove { key } => key,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Document>,
    /// Matching rows (or groups) before the page window.
    pub total: usize,
}

/// Document storage the repository layer runs on.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query(&self, collection: &Collection, filter: &Filter) -> Result<QueryResult, StoreError>;

    /// Applies the operations as one batch: either all or none.
    async fn apply(&self, collection: &Collection, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    async fn drop_collection(&self, collection: &Collection) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
