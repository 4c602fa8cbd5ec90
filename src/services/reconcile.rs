//! Partial updates across a group of denormalized rows.
//!
//! A record is materialized as every meta row carrying its `record_id`, so a
//! record-level patch has to land on all of them or on none. The reconciler
//! diffs the patch against each row, rejects changes the schema forbids and
//! only then merges the patch into every row.

use serde_json::Value;

use crate::schema::{Aggregation, Config};
use crate::services::MetaError;
use crate::types::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,    // Key missing from the row
    Modified, // Key present with a different value
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Record,
    File,
}

impl Level {
    fn noun(&self) -> &'static str {
        match self {
            Level::Record => "record",
            Level::File => "file",
        }
    }
}

pub struct GroupReconciler<'a> {
    config: &'a Config,
    level: Level,
}

impl<'a> GroupReconciler<'a> {
    pub fn new(config: &'a Config, level: Level) -> Self {
        Self { config, level }
    }

    /// One entry per patched field that differs from at least one row,
    /// recording the first row where it differs.
    pub fn diff(&self, rows: &[Document], patch: &Document) -> Vec<FieldChange> {
        let mut changes: Vec<FieldChange> = Vec::new();
        for row in rows {
            for (field, new_value) in patch {
                if changes.iter().any(|c| &c.field == field) {
                    continue;
                }
                let change_type = match row.get(field) {
                    None => ChangeType::Added,
                    Some(old) if old != new_value => ChangeType::Modified,
                    Some(_) => continue,
                };
                changes.push(FieldChange {
                    field: field.clone(),
                    old_value: row.get(field).cloned(),
                    new_value: new_value.clone(),
                    change_type,
                });
            }
        }
        changes
    }

    pub fn validate(&self, changes: &[FieldChange]) -> Result<(), MetaError> {
        for change in changes {
            let field = change.field.as_str();
            if self.config.is_index(field) {
                return Err(MetaError::InvalidData(format!(
                    "Key \"{}\" cannot be updated. Please delete and re-create this {} instead.",
                    field,
                    self.level.noun()
                )));
            }
            if self.level == Level::File {
                continue;
            }
            match self.config.column(field).map(|c| c.aggregation) {
                None | Some(Aggregation::First) => {}
                Some(other) => {
                    return Err(MetaError::InvalidData(format!(
                        "Key \"{}\" cannot be updated on a record because its aggregation is \"{}\". \
                         Consider updating on file-level.",
                        field,
                        other.as_str()
                    )))
                }
            }
        }
        Ok(())
    }

    /// Diff and validate; nothing is modified.
    pub fn plan(&self, rows: &[Document], patch: &Document) -> Result<Vec<FieldChange>, MetaError> {
        let changes = self.diff(rows, patch);
        self.validate(&changes)?;
        tracing::debug!("{} level patch changes {} field(s)", self.level.noun(), changes.len());
        Ok(changes)
    }

    /// Shallow merge of the patch into every row. Explicit nulls overwrite.
    pub fn apply(&self, rows: Vec<Document>, patch: &Document) -> Vec<Document> {
        rows.into_iter()
            .map(|mut row| {
                row.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
                row
            })
            .collect()
    }
}
