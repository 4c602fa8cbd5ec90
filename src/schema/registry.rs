use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use super::column::{Aggregation, ColumnSpec, Config};
use crate::services::MetaError;

/// Config written when a database is created.
pub static META_TEMPLATE: Lazy<Config> = Lazy::new(|| Config {
    columns: vec![
        ColumnSpec::new("record_id", "string", Aggregation::First, "Record ID"),
        ColumnSpec::new("path", "string", Aggregation::Set, "Path"),
        ColumnSpec::new("content_type", "string", Aggregation::Set, "Content type"),
        ColumnSpec::new("start_timestamp", "float", Aggregation::Min, "Start timestamp"),
        ColumnSpec::new("end_timestamp", "float", Aggregation::Max, "End timestamp"),
        ColumnSpec::new("tags", "object", Aggregation::Union, "Tags"),
    ],
    index_columns: vec!["record_id".to_string()],
    extra: Map::new(),
});

/// Fixed schema of the database registry itself.
pub static DATABASE_REGISTRY_CONFIG: Lazy<Config> = Lazy::new(|| Config {
    columns: vec![
        ColumnSpec::new("database_id", "string", Aggregation::First, "Database ID"),
        ColumnSpec::new("name", "string", Aggregation::First, "Name"),
        ColumnSpec::new("description", "string", Aggregation::First, "Description"),
    ],
    index_columns: vec!["database_id".to_string()],
    extra: Map::new(),
});

const REQUIRED_COLUMN_KEYS: [&str; 3] = ["name", "dtype", "aggregation"];

/// Checks a config patch against the stored config. Columns may be added
/// but never removed or renamed, names are unique, and `index_columns`
/// must be a non-empty list of known columns.
pub fn validate_patch(current: &Config, patch: &Map<String, Value>) -> Result<(), MetaError> {
    let mut known: HashSet<String> = current.column_names().into_iter().collect();

    if let Some(columns) = patch.get("columns") {
        let columns = columns
            .as_array()
            .ok_or_else(|| MetaError::InvalidData("\"columns\" must be a list".to_string()))?;

        let mut proposed = HashSet::new();
        for column in columns {
            let column = column
                .as_object()
                .ok_or_else(|| MetaError::InvalidData("Each column must be an object".to_string()))?;
            for key in REQUIRED_COLUMN_KEYS {
                if !column.contains_key(key) {
                    return Err(MetaError::InvalidData(format!("Column is missing \"{}\"", key)));
                }
            }
            let name = column
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| MetaError::InvalidData("Column \"name\" must be a non-empty string".to_string()))?;
            let aggregation = column.get("aggregation").and_then(Value::as_str).unwrap_or_default();
            if Aggregation::parse(aggregation).is_none() {
                return Err(MetaError::InvalidData(format!(
                    "Unknown aggregation {:?} for column {:?} (expected one of {})",
                    aggregation,
                    name,
                    Aggregation::NAMES.join(", ")
                )));
            }
            if !proposed.insert(name.to_string()) {
                return Err(MetaError::InvalidData(format!("Duplicate column {:?}", name)));
            }
        }

        let missing: Vec<&str> = current
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| !proposed.contains(*n))
            .collect();
        if !missing.is_empty() {
            return Err(MetaError::InvalidData(format!(
                "Cannot remove or rename columns: {}",
                missing.join(", ")
            )));
        }
        known = proposed;
    }

    if let Some(index_columns) = patch.get("index_columns") {
        let index_columns = index_columns
            .as_array()
            .ok_or_else(|| MetaError::InvalidData("\"index_columns\" must be a list".to_string()))?;
        if index_columns.is_empty() {
            return Err(MetaError::InvalidData("\"index_columns\" must not be empty".to_string()));
        }
        for column in index_columns {
            let name = column
                .as_str()
                .ok_or_else(|| MetaError::InvalidData("\"index_columns\" must contain column names".to_string()))?;
            if !known.contains(name) {
                return Err(MetaError::InvalidData(format!("Index column {:?} is not a column", name)));
            }
        }
    }

    Ok(())
}

/// Shallow merge: top-level patch keys replace stored keys, so `columns`
/// is replaced as a whole.
pub fn merge(current: &Config, patch: Map<String, Value>) -> Result<Config, MetaError> {
    let mut doc = current.to_document();
    doc.extend(patch);
    serde_json::from_value(Value::Object(doc)).map_err(|e| MetaError::InvalidData(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn template_columns() -> Vec<Value> {
        META_TEMPLATE
            .to_document()
            .get("columns")
            .and_then(Value::as_array)
            .cloned()
            .unwrap()
    }

    #[test]
    fn same_columns_pass() {
        let p = patch(json!({"columns": template_columns()}));
        assert!(validate_patch(&META_TEMPLATE, &p).is_ok());
    }

    #[test]
    fn adding_a_column_is_allowed() {
        let mut columns = template_columns();
        columns.push(json!({"name": "size", "dtype": "int", "aggregation": "sum"}));
        let p = patch(json!({"columns": columns}));
        validate_patch(&META_TEMPLATE, &p).unwrap();

        let merged = merge(&META_TEMPLATE, p).unwrap();
        assert_eq!(merged.columns.len(), META_TEMPLATE.columns.len() + 1);
        assert_eq!(merged.column("size").unwrap().aggregation, Aggregation::Sum);
        assert_eq!(merged.index_columns, vec!["record_id".to_string()]);
    }

    #[test]
    fn removing_or_renaming_fails() {
        let mut columns = template_columns();
        columns.pop();
        let err = validate_patch(&META_TEMPLATE, &patch(json!({"columns": columns}))).unwrap_err();
        assert!(matches!(err, MetaError::InvalidData(msg) if msg.contains("tags")));

        let mut columns = template_columns();
        columns[1]["name"] = json!("file_path");
        assert!(validate_patch(&META_TEMPLATE, &patch(json!({"columns": columns}))).is_err());

        assert!(validate_patch(&META_TEMPLATE, &patch(json!({"columns": []}))).is_err());
    }

    #[test]
    fn column_entries_need_required_keys() {
        let mut columns = template_columns();
        columns.push(json!({"name": "x", "dtype": "int"}));
        let err = validate_patch(&META_TEMPLATE, &patch(json!({"columns": columns}))).unwrap_err();
        assert!(matches!(err, MetaError::InvalidData(msg) if msg.contains("aggregation")));

        let mut columns = template_columns();
        columns.push(json!({"name": " ", "dtype": "int", "aggregation": "first"}));
        assert!(validate_patch(&META_TEMPLATE, &patch(json!({"columns": columns}))).is_err());

        let mut columns = template_columns();
        columns.push(json!({"name": "x", "dtype": "int", "aggregation": "avg"}));
        assert!(validate_patch(&META_TEMPLATE, &patch(json!({"columns": columns}))).is_err());
    }

    #[test]
    fn index_columns_cannot_be_emptied() {
        let err = validate_patch(&META_TEMPLATE, &patch(json!({"index_columns": []}))).unwrap_err();
        assert!(matches!(err, MetaError::InvalidData(_)));
        assert!(validate_patch(&META_TEMPLATE, &patch(json!({"index_columns": ["record_id", "path"]}))).is_ok());
    }

    #[test]
    fn index_columns_must_name_columns() {
        let err = validate_patch(&META_TEMPLATE, &patch(json!({"index_columns": ["record_id", "nope"]}))).unwrap_err();
        assert!(matches!(err, MetaError::InvalidData(msg) if msg.contains("nope")));

        let mut columns = template_columns();
        columns.push(json!({"name": "run", "dtype": "string", "aggregation": "first"}));
        let p = patch(json!({"columns": columns, "index_columns": ["record_id", "run"]}));
        assert!(validate_patch(&META_TEMPLATE, &p).is_ok());
    }

    #[test]
    fn duplicate_column_names_fail() {
        let mut columns = template_columns();
        columns.push(json!({"name": "path", "dtype": "string", "aggregation": "first"}));
        let err = validate_patch(&META_TEMPLATE, &patch(json!({"columns": columns}))).unwrap_err();
        assert!(matches!(err, MetaError::InvalidData(msg) if msg.contains("Duplicate")));
    }

    #[test]
    fn extra_top_level_keys_are_kept() {
        let merged = merge(&META_TEMPLATE, patch(json!({"title": "Sensor data"}))).unwrap();
        assert_eq!(merged.extra.get("title"), Some(&json!("Sensor data")));
        assert_eq!(merged.columns, META_TEMPLATE.columns);
    }
}
