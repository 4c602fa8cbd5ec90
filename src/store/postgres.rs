use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};

use super::aggregate;
use super::traits::{Collection, DocumentStore, QueryResult, StoreError, WriteOp};
use crate::config::StoreConfig;
use crate::filter::filter::DOCUMENT_TABLE;
use crate::filter::{Filter, SqlParam};
use crate::types::Document;

/// All collections live in one JSONB table keyed by `(collection, doc_key)`.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Connection("DATABASE_URL is not set".to_string()))?;
        let url = url::Url::parse(database_url)
            .map_err(|e| StoreError::Connection(format!("invalid database url: {}", e)))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url.as_str())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(
            "Connected document store to {}{}",
            url.host_str().unwrap_or("localhost"),
            url.path()
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                seq BIGSERIAL,
                collection TEXT NOT NULL,
                doc_key TEXT NOT NULL,
                doc JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, doc_key)
            )",
            DOCUMENT_TABLE
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_rows(&self, collection: &Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let sql = filter.to_sql(&collection.to_string())?;
        debug!("store query: {}", sql.query);
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_doc).collect()
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Int(i) => query.bind(*i),
            SqlParam::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}

fn decode_doc(row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
    let sqlx::types::Json(doc) = row
        .try_get::<sqlx::types::Json<Document>, _>("doc")
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(doc)
}

#[async_trait::async_trait]
impl DocumentStore for PostgresStore {
    async fn query(&self, collection: &Collection, filter: &Filter) -> Result<QueryResult, StoreError> {
        // Grouping and its ordering happen in process over every row of the collection.
        if filter.grouping().is_some() {
            let rows = self.fetch_rows(collection, &Filter::new()).await?;
            return aggregate::execute(rows, filter);
        }

        let count_sql = filter.to_count_sql(&collection.to_string())?;
        let total: i64 = bind_params(sqlx::query(&count_sql.query), &count_sql.params)
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        let rows = self.fetch_rows(collection, filter).await?;
        Ok(QueryResult { rows, total: total.max(0) as usize })
    }

    async fn apply(&self, collection: &Collection, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let name = collection.to_string();
        let insert = format!(
            "INSERT INTO {} (collection, doc_key, doc) VALUES ($1, $2, $3) ON CONFLICT (collection, doc_key) DO NOTHING",
            DOCUMENT_TABLE
        );
        let upsert = format!(
            "INSERT INTO {} (collection, doc_key, doc) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, doc_key) DO UPDATE SET doc = EXCLUDED.doc, updated_at = now()",
            DOCUMENT_TABLE
        );
        let remove = format!("DELETE FROM {} WHERE collection = $1 AND doc_key = $2", DOCUMENT_TABLE);

        let mut tx = self.pool.begin().await?;
        for op in &ops {
            match op {
                WriteOp::Insert { key, doc } => {
                    let result = sqlx::query(&insert)
                        .bind(&name)
                        .bind(key)
                        .bind(sqlx::types::Json(doc))
                        .execute(&mut *tx)
                        .await?;
                    if result.rows_affected() == 0 {
                        // Dropping the transaction rolls the batch back.
                        return Err(StoreError::Conflict { collection: name, key: key.clone() });
                    }
                }
                WriteOp::Overwrite { key, doc } => {
                    sqlx::query(&upsert)
                        .bind(&name)
                        .bind(key)
                        .bind(sqlx::types::Json(doc))
                        .execute(&mut *tx)
                        .await?;
                }
                WriteOp::Remove { key } => {
                    sqlx::query(&remove).bind(&name).bind(key).execute(&mut *tx).await?;
                }
            }
        }
        tx.commit().await?;
        debug!("applied {} write(s) to {}", ops.len(), name);
        Ok(())
    }

    async fn drop_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE collection = $1", DOCUMENT_TABLE);
        let result = sqlx::query(&sql).bind(collection.to_string()).execute(&self.pool).await?;
        info!("dropped {} ({} rows)", collection, result.rows_affected());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}
