use std::fmt;

use serde_json::Value;

use crate::schema::Aggregation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Literal {
    /// Digit-only text becomes an integer; anything else stays a string.
    pub fn from_token(value: &str) -> Self {
        match value {
            "true" | "True" => Literal::Bool(true),
            "false" | "False" => Literal::Bool(false),
            v if is_decimal(v) => v.parse().map(Literal::Int).unwrap_or_else(|_| Literal::Str(v.to_string())),
            v => Literal::Str(v.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::from(*i),
            Literal::Str(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(true) => write!(f, "True"),
            Literal::Bool(false) => write!(f, "False"),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Str(s) => write!(f, "'{}'", s),
        }
    }
}

pub(crate) fn is_decimal(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Backend-neutral boolean expression over document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { key: String, op: CompareOp, value: Literal },
    Regex { key: String, pattern: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(key: impl Into<String>, value: impl Into<Literal>) -> Self {
        Predicate::Compare { key: key.into(), op: CompareOp::Eq, value: value.into() }
    }

    /// ANDs two optional predicates, flattening nested conjunctions.
    pub fn and(left: Option<Predicate>, right: Option<Predicate>) -> Option<Predicate> {
        match (left, right) {
            (None, p) | (p, None) => p,
            (Some(l), Some(r)) => {
                let mut parts = Vec::new();
                for p in [l, r] {
                    match p {
                        Predicate::And(inner) => parts.extend(inner),
                        other => parts.push(other),
                    }
                }
                Some(Predicate::And(parts))
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { key, op, value } => write!(f, "'{}' {} {}", key, op.symbol(), value),
            Predicate::Regex { key, pattern } => {
                if is_decimal(pattern) {
                    write!(f, "'{}' == regex({})", key, pattern)
                } else {
                    write!(f, "'{}' == regex('{}')", key, pattern)
                }
            }
            Predicate::And(parts) => write_joined(f, parts, " and "),
            Predicate::Or(parts) => {
                write!(f, "(")?;
                write_joined(f, parts, " or ")?;
                write!(f, ")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Predicate], sep: &str) -> fmt::Result {
    for (idx, part) in parts.iter().enumerate() {
        if idx != 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", part)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// Collapse rows sharing `key` into one document, column by column.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub key: String,
    pub aggregations: Vec<(String, Aggregation)>,
}

impl GroupBy {
    pub fn aggregation_for(&self, column: &str) -> Aggregation {
        self.aggregations
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, agg)| *agg)
            .unwrap_or(Aggregation::First)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Json(Value),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}
