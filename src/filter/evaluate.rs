//! In-process evaluation of [`Predicate`]s against JSON documents.
//!
//! Semantics mirror the JSONB SQL produced by `filter_where`:
//! equality matches a scalar or any element of an array, range operators only
//! compare numbers with numbers and strings with strings, and regexes match
//! strings, numbers (as text) or any string element of an array.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{CompareOp, Literal, Predicate, SortDirection};

#[derive(Debug)]
pub enum Matcher {
    All,
    Compare { key: String, op: CompareOp, value: Literal },
    Regex { key: String, regex: Regex },
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
}

impl Matcher {
    pub fn compile(predicate: Option<&Predicate>) -> Result<Self, FilterError> {
        match predicate {
            None => Ok(Matcher::All),
            Some(p) => Self::compile_one(p),
        }
    }

    fn compile_one(predicate: &Predicate) -> Result<Self, FilterError> {
        Ok(match predicate {
            Predicate::Compare { key, op, value } => Matcher::Compare {
                key: key.clone(),
                op: *op,
                value: value.clone(),
            },
            Predicate::Regex { key, pattern } => Matcher::Regex {
                key: key.clone(),
                regex: Regex::new(pattern).map_err(|e| FilterError::InvalidPattern(e.to_string()))?,
            },
            Predicate::And(parts) => Matcher::And(parts.iter().map(Self::compile_one).collect::<Result<_, _>>()?),
            Predicate::Or(parts) => Matcher::Or(parts.iter().map(Self::compile_one).collect::<Result<_, _>>()?),
        })
    }

    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Compare { key, op, value } => compare(doc.get(key), *op, value),
            Matcher::Regex { key, regex } => match doc.get(key) {
                Some(Value::String(s)) => regex.is_match(s),
                Some(Value::Number(n)) => regex.is_match(&n.to_string()),
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| matches!(item, Value::String(s) if regex.is_match(s))),
                _ => false,
            },
            Matcher::And(parts) => parts.iter().all(|m| m.matches(doc)),
            Matcher::Or(parts) => parts.iter().any(|m| m.matches(doc)),
        }
    }
}

fn compare(actual: Option<&Value>, op: CompareOp, expected: &Literal) -> bool {
    match op {
        CompareOp::Eq => actual.map(|v| contains(v, expected)).unwrap_or(false),
        CompareOp::Ne => !actual.map(|v| contains(v, expected)).unwrap_or(false),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            let ordering = match (actual, expected) {
                (Some(Value::Number(n)), Literal::Int(i)) => n.as_f64().and_then(|f| f.partial_cmp(&(*i as f64))),
                (Some(Value::String(s)), Literal::Str(e)) => Some(s.as_str().cmp(e.as_str())),
                _ => None,
            };
            match ordering {
                Some(ord) => match op {
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                    CompareOp::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                },
                None => false,
            }
        }
    }
}

fn contains(actual: &Value, expected: &Literal) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| scalar_eq(item, expected)),
        other => scalar_eq(other, expected),
    }
}

fn scalar_eq(actual: &Value, expected: &Literal) -> bool {
    match (actual, expected) {
        (Value::Bool(a), Literal::Bool(b)) => a == b,
        (Value::Number(n), Literal::Int(i)) => n.as_f64() == Some(*i as f64),
        (Value::String(s), Literal::Str(e)) => s == e,
        _ => false,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values following the JSONB type ranking.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Sorts documents by `column`; rows missing the column sort last in
/// either direction.
pub fn sort_documents(rows: &mut [Map<String, Value>], column: &str, direction: SortDirection) {
    rows.sort_by(|a, b| match (a.get(column), b.get(column)) {
        (Some(x), Some(y)) => match direction {
            SortDirection::Asc => compare_values(x, y),
            SortDirection::Desc => compare_values(y, x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::search::parse_search_keyword;
    use serde_json::json;

    fn doc(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn matcher(search: &str, columns: &[&str]) -> Matcher {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let predicate = parse_search_keyword(Some(search), &columns).unwrap();
        Matcher::compile(predicate.as_ref()).unwrap()
    }

    #[test]
    fn bare_term_is_case_insensitive() {
        let m = matcher("desc", &["database_id", "description"]);
        assert!(m.matches(&doc(json!({"database_id": "test", "description": "Description"}))));
        let m = matcher("desc", &["database_id"]);
        assert!(!m.matches(&doc(json!({"database_id": "test", "description": "Description"}))));
    }

    #[test]
    fn equality_matches_array_elements() {
        let m = matcher("tags=blue", &[]);
        assert!(m.matches(&doc(json!({"tags": ["red", "blue"]}))));
        assert!(!m.matches(&doc(json!({"tags": ["red"]}))));
    }

    #[test]
    fn not_equal_matches_missing_key() {
        let m = matcher("name!=abc", &[]);
        assert!(m.matches(&doc(json!({}))));
        assert!(m.matches(&doc(json!({"name": "xyz"}))));
        assert!(!m.matches(&doc(json!({"name": "abc"}))));
    }

    #[test]
    fn ranges_compare_like_types_only() {
        let m = matcher("time>=10", &[]);
        assert!(m.matches(&doc(json!({"time": 10}))));
        assert!(m.matches(&doc(json!({"time": 10.5}))));
        assert!(!m.matches(&doc(json!({"time": 9}))));
        assert!(!m.matches(&doc(json!({"time": "11"}))));
        assert!(!m.matches(&doc(json!({}))));
    }

    #[test]
    fn booleans_match_exactly() {
        let m = matcher("flag:true", &[]);
        assert!(m.matches(&doc(json!({"flag": true}))));
        assert!(!m.matches(&doc(json!({"flag": "true"}))));
    }

    #[test]
    fn missing_column_sorts_last_both_ways() {
        let mut rows = vec![doc(json!({"a": 2})), doc(json!({})), doc(json!({"a": 1}))];
        sort_documents(&mut rows, "a", SortDirection::Asc);
        assert_eq!(rows[0]["a"], json!(1));
        assert!(rows[2].get("a").is_none());

        sort_documents(&mut rows, "a", SortDirection::Desc);
        assert_eq!(rows[0]["a"], json!(2));
        assert!(rows[2].get("a").is_none());
    }
}
