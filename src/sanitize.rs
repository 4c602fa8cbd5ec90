//! Allow-list sanitizer for identifiers, keys and free-text filters.
//!
//! Sanitizing is lossy: characters outside the kind's allow-list are deleted.
//! Callers that need validation compare the result against the input.

use serde_json::{Map, Value};

use crate::services::MetaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Id,
    Uuid,
    Key,
    Path,
    Filtering,
}

const KEY_EXTRA: &str = "_=<>/()@-";
const ID_EXTRA: &str = "_-";
const TEXT_EXTRA: &str = ":;.,_=<>\"'/~!@#$%^&()+-";

impl Kind {
    fn allowed_punctuation(self) -> &'static str {
        match self {
            Kind::Id | Kind::Uuid => ID_EXTRA,
            Kind::Key => KEY_EXTRA,
            Kind::Path | Kind::Filtering => TEXT_EXTRA,
        }
    }

    fn allows(self, c: char) -> bool {
        c.is_ascii_alphanumeric() || self.allowed_punctuation().contains(c)
    }
}

pub fn sanitize(value: Option<&str>, kind: Kind) -> Option<String> {
    value.map(|v| v.chars().filter(|c| kind.allows(*c)).collect())
}

/// Sanitizes a search string token by token so the separating spaces
/// survive.
pub fn sanitize_search(value: &str) -> String {
    value
        .split(' ')
        .map(|token| token.chars().filter(|c| Kind::Filtering.allows(*c)).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sanitizes `value` and fails if anything had to be removed.
pub fn require_clean(value: &str, kind: Kind, what: &str) -> Result<String, MetaError> {
    match sanitize(Some(value), kind) {
        Some(clean) if clean == value => Ok(clean),
        _ => Err(MetaError::InvalidData(format!("Invalid {}: {:?}", what, value))),
    }
}

/// Boundary check for write payloads: keys may not start with `_` or `.`
/// and must already be clean under the `Key` allow-list.
pub fn validate_input_data(data: &Map<String, Value>) -> Result<(), MetaError> {
    for key in data.keys() {
        if key.starts_with('_') || key.starts_with('.') {
            return Err(MetaError::InvalidData(format!(
                "Key {:?} cannot start with '_' or '.'",
                key
            )));
        }
        if sanitize(Some(key), Kind::Key).as_deref() != Some(key.as_str()) {
            return Err(MetaError::InvalidData(format!("Key {:?} contains invalid characters", key)));
        }
    }
    Ok(())
}

/// Drops internal (`_`-prefixed) keys and any key listed in `excluded`.
pub fn filter_output(mut doc: Map<String, Value>, excluded: &[String]) -> Map<String, Value> {
    doc.retain(|k, _| !k.starts_with('_') && !excluded.iter().any(|e| e == k));
    doc
}
