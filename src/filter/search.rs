//! Search keyword mini-language.
//!
//! A search string is split on single spaces; every token becomes one clause
//! and the clauses are ANDed. A token is either `key<op>value` with one of
//! `:` (regex), `>=`, `<=`, `!=`, `=`, `>`, `<` (tried in that order), or a
//! bare term that is matched case-insensitively against every candidate
//! column.

use regex::Regex;

use super::error::FilterError;
use super::types::{CompareOp, Literal, Predicate};

#[derive(Debug, Clone, Copy)]
enum TokenOp {
    Regex,
    Compare(CompareOp),
}

const OPERATORS: [(&str, TokenOp); 7] = [
    (":", TokenOp::Regex),
    (">=", TokenOp::Compare(CompareOp::Gte)),
    ("<=", TokenOp::Compare(CompareOp::Lte)),
    ("!=", TokenOp::Compare(CompareOp::Ne)),
    ("=", TokenOp::Compare(CompareOp::Eq)),
    (">", TokenOp::Compare(CompareOp::Gt)),
    ("<", TokenOp::Compare(CompareOp::Lt)),
];

pub fn parse_search_keyword(
    search: Option<&str>,
    columns: &[String],
) -> Result<Option<Predicate>, FilterError> {
    let search = match search {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(None),
    };

    let mut clauses = Vec::new();
    for token in search.split(' ') {
        if token.is_empty() {
            continue;
        }
        if let Some(clause) = parse_token(token, columns)? {
            clauses.push(clause);
        }
    }

    tracing::debug!("search {:?} parsed into {} clause(s)", search, clauses.len());
    Ok(match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(Predicate::And(clauses)),
    })
}

fn parse_token(token: &str, columns: &[String]) -> Result<Option<Predicate>, FilterError> {
    for (symbol, op) in OPERATORS {
        if let Some((key, value)) = token.split_once(symbol) {
            return build_clause(key, op, &value.replace('\\', ""));
        }
    }

    let term = token.replace('\\', "");
    let mut alternatives = Vec::with_capacity(columns.len());
    for column in columns {
        if let Some(clause) = build_clause(column, TokenOp::Regex, &format!("(?i).*{}.*", term))? {
            alternatives.push(clause);
        }
    }
    Ok(if alternatives.is_empty() { None } else { Some(Predicate::Or(alternatives)) })
}

fn build_clause(key: &str, op: TokenOp, value: &str) -> Result<Option<Predicate>, FilterError> {
    if key.is_empty() || value.is_empty() {
        return Ok(None);
    }
    let key = key.to_string();

    if let literal @ Literal::Bool(_) = Literal::from_token(value) {
        return Ok(Some(Predicate::Compare { key, op: CompareOp::Eq, value: literal }));
    }

    Ok(Some(match op {
        TokenOp::Regex => {
            Regex::new(value).map_err(|e| FilterError::InvalidPattern(e.to_string()))?;
            Predicate::Regex { key, pattern: value.to_string() }
        }
        TokenOp::Compare(op) => Predicate::Compare { key, op, value: Literal::from_token(value) },
    }))
}
