use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::GroupBy;
use crate::services::MetaError;

/// How the values of one column collapse when rows are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    First,
    Min,
    Max,
    Sum,
    Set,
    Union,
}

impl Aggregation {
    pub const NAMES: [&'static str; 6] = ["first", "min", "max", "sum", "set", "union"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::First => "first",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Sum => "sum",
            Aggregation::Set => "set",
            Aggregation::Union => "union",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "first" => Aggregation::First,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "sum" => Aggregation::Sum,
            "set" => Aggregation::Set,
            "union" => Aggregation::Union,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: String,
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ColumnSpec {
    pub fn new(name: &str, dtype: &str, aggregation: Aggregation, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            dtype: dtype.to_string(),
            aggregation,
            display_name: Some(display_name.to_string()),
            is_secret: None,
            extra: Map::new(),
        }
    }

    /// Column registered automatically the first time a key is written.
    pub fn inferred(name: &str, value: &Value) -> Self {
        Self::new(name, infer_dtype(value), Aggregation::First, name)
    }

    pub fn is_secret(&self) -> bool {
        self.is_secret.unwrap_or(false)
    }
}

pub fn infer_dtype(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::Array(_) | Value::Object(_) => "object",
        Value::String(_) | Value::Null => "string",
    }
}

/// Per-database schema document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub index_columns: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Config {
    pub fn from_document(doc: Map<String, Value>) -> Result<Self, MetaError> {
        serde_json::from_value(Value::Object(doc))
            .map_err(|e| MetaError::InvalidObject(format!("Stored config is corrupt: {}", e)))
    }

    pub fn to_document(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_index(&self, name: &str) -> bool {
        self.index_columns.iter().any(|c| c == name)
    }

    pub fn secret_columns(&self) -> Vec<String> {
        self.columns.iter().filter(|c| c.is_secret()).map(|c| c.name.clone()).collect()
    }

    pub fn group_by(&self, key: &str) -> GroupBy {
        GroupBy {
            key: key.to_string(),
            aggregations: self.columns.iter().map(|c| (c.name.clone(), c.aggregation)).collect(),
        }
    }

    /// Appends a column for every non-internal key of `doc` not yet known.
    /// Returns whether anything was added.
    pub fn register_columns(&mut self, doc: &Map<String, Value>) -> bool {
        let mut changed = false;
        for (key, value) in doc {
            if key.starts_with('_') || self.column(key).is_some() {
                continue;
            }
            tracing::debug!("registering column {:?}", key);
            self.columns.push(ColumnSpec::inferred(key, value));
            changed = true;
        }
        changed
    }
}
