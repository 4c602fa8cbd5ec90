use thiserror::Error;

use crate::filter::FilterError;
use crate::store::StoreError;

/// Domain failures raised by the resource services.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("{0}")]
    ObjectDoesNotExist(String),

    #[error("{0}")]
    ObjectExists(String),

    /// The store holds data that breaks an integrity assumption.
    #[error("{0}")]
    InvalidObject(String),

    #[error("{0}")]
    InvalidData(String),

    #[error("Invalid sort key: {0}")]
    InvalidSortKey(String),

    #[error("{0}")]
    InvalidPattern(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<FilterError> for MetaError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::InvalidSortKey(key) => MetaError::InvalidSortKey(key),
            FilterError::InvalidPattern(detail) => MetaError::InvalidPattern(detail),
            other => MetaError::InvalidData(other.to_string()),
        }
    }
}

impl From<StoreError> for MetaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { collection, key } => {
                MetaError::ObjectExists(format!("\"{}\" already exists in {}", key, collection))
            }
            StoreError::Corrupt(msg) => MetaError::InvalidObject(msg),
            StoreError::Filter(e) => e.into(),
            other => MetaError::Store(other),
        }
    }
}
