//! Row pipeline shared by the backends: match, group, sort, page.

use std::collections::HashMap;

use serde_json::{Number, Value};

use super::traits::{QueryResult, StoreError};
use crate::filter::evaluate::{compare_values, sort_documents};
use crate::filter::{Filter, GroupBy, Matcher};
use crate::schema::Aggregation;
use crate::types::Document;

pub fn execute(rows: Vec<Document>, filter: &Filter) -> Result<QueryResult, StoreError> {
    let matcher = Matcher::compile(filter.predicate())?;
    let mut rows: Vec<Document> = rows.into_iter().filter(|r| matcher.matches(r)).collect();

    if let Some(group) = filter.grouping() {
        rows = group_rows(rows, group);
    }
    for info in filter.order_info().iter().rev() {
        sort_documents(&mut rows, &info.column, info.sort);
    }

    let total = rows.len();
    Ok(QueryResult { rows: filter.paginate(rows), total })
}

/// Collapses rows sharing the group key into one document each, in order of
/// first appearance. Internal `_` keys are dropped from grouped output.
pub fn group_rows(rows: Vec<Document>, group: &GroupBy) -> Vec<Document> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Document>> = Vec::new();

    for row in rows {
        let key = row.get(&group.key).cloned().unwrap_or(Value::Null).to_string();
        match index.get(&key) {
            Some(&i) => groups[i].push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }

    groups.into_iter().map(|members| collapse(&members, group)).collect()
}

fn collapse(members: &[Document], group: &GroupBy) -> Document {
    let mut columns: Vec<&String> = Vec::new();
    for row in members {
        for key in row.keys() {
            if !key.starts_with('_') && !columns.contains(&key) {
                columns.push(key);
            }
        }
    }

    let mut out = Document::new();
    for column in columns {
        let values: Vec<&Value> = members.iter().filter_map(|r| r.get(column)).collect();
        let aggregation = if *column == group.key { Aggregation::First } else { group.aggregation_for(column) };
        out.insert(column.clone(), aggregate(aggregation, &values));
    }
    out
}

pub fn aggregate(aggregation: Aggregation, values: &[&Value]) -> Value {
    let present = || values.iter().copied().filter(|v| !v.is_null());
    match aggregation {
        Aggregation::First => present().next().cloned().unwrap_or(Value::Null),
        Aggregation::Min => present().min_by(|a, b| compare_values(a, b)).cloned().unwrap_or(Value::Null),
        Aggregation::Max => present().max_by(|a, b| compare_values(a, b)).cloned().unwrap_or(Value::Null),
        Aggregation::Sum => sum(present()),
        Aggregation::Set => Value::Array(unique(present().cloned())),
        Aggregation::Union => Value::Array(unique(present().flat_map(|v| match v {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        }))),
    }
}

fn sum<'a>(values: impl Iterator<Item = &'a Value>) -> Value {
    let numbers: Vec<&Number> = values
        .filter_map(|v| match v {
            Value::Number(n) => Some(n),
            _ => None,
        })
        .collect();
    if numbers.is_empty() {
        return Value::Null;
    }
    let ints: Option<Vec<i64>> = numbers.iter().map(|n| n.as_i64()).collect();
    if let Some(total) = ints.and_then(|ints| ints.into_iter().try_fold(0i64, |acc, i| acc.checked_add(i))) {
        return Value::from(total);
    }
    let total: f64 = numbers.iter().filter_map(|n| n.as_f64()).sum();
    Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
}

fn unique(values: impl Iterator<Item = Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}
