use serde_json::{Map, Value};

/// A stored or returned JSON object.
pub type Document = Map<String, Value>;

/// How a queued write treats an existing document with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    #[default]
    Insert,
    Overwrite,
}
