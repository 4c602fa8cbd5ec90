use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection, SqlParam};

pub struct FilterOrder;

impl FilterOrder {
    /// `sort_key` must name one of the configured columns.
    pub fn validate_and_parse(
        sort_key: &str,
        sort_order: i64,
        columns: &[String],
    ) -> Result<FilterOrderInfo, FilterError> {
        if !columns.iter().any(|c| c == sort_key) {
            return Err(FilterError::InvalidSortKey(sort_key.to_string()));
        }
        let sort = match sort_order {
            1 => SortDirection::Asc,
            -1 => SortDirection::Desc,
            other => return Err(FilterError::InvalidSortOrder(other)),
        };
        Ok(FilterOrderInfo { column: sort_key.to_string(), sort })
    }

    pub fn generate(infos: &[FilterOrderInfo], starting_param_index: usize) -> (String, Vec<SqlParam>) {
        if infos.is_empty() {
            return (String::new(), vec![]);
        }
        let mut params = Vec::with_capacity(infos.len());
        let parts: Vec<String> = infos
            .iter()
            .enumerate()
            .map(|(i, info)| {
                params.push(SqlParam::Text(info.column.clone()));
                format!("doc->${}::text {} NULLS LAST", starting_param_index + i + 1, info.sort.to_sql())
            })
            .collect();
        (format!("ORDER BY {}", parts.join(", ")), params)
    }
}
