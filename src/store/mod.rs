pub mod aggregate;
pub mod memory;
pub mod postgres;
pub mod traits;

use std::sync::Arc;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use traits::{Collection, DocumentStore, QueryResult, StoreError, WriteOp};

use crate::config::{StoreBackend, StoreConfig};

/// Builds the configured backend. Postgres tables are created on first use.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(config).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}
