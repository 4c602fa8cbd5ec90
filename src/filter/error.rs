use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid sort key: {0}")]
    InvalidSortKey(String),

    #[error("Invalid sort order: {0} (expected 1 or -1)")]
    InvalidSortOrder(i64),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),
}
