use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, GroupBy, Predicate, SqlParam, SqlResult};

/// Table holding every collection's documents in the Postgres backend.
pub const DOCUMENT_TABLE: &str = "meta_documents";

/// A query over one collection: predicate, order, optional grouping and a page window.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    where_data: Option<Predicate>,
    order_data: Vec<FilterOrderInfo>,
    group_by: Option<GroupBy>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// ANDs `predicate` onto whatever condition is already set.
    pub fn where_clause(&mut self, predicate: Option<Predicate>) -> &mut Self {
        self.where_data = Predicate::and(self.where_data.take(), predicate);
        self
    }

    pub fn order(&mut self, info: FilterOrderInfo) -> &mut Self {
        self.order_data.push(info);
        self
    }

    pub fn group_by(&mut self, group_by: GroupBy) -> &mut Self {
        self.group_by = Some(group_by);
        self
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.where_data.as_ref()
    }

    pub fn order_info(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn grouping(&self) -> Option<&GroupBy> {
        self.group_by.as_ref()
    }

    pub fn offset_value(&self) -> i64 {
        self.offset.unwrap_or(0)
    }

    /// Applies the page window to an already filtered and ordered list.
    pub fn paginate<T>(&self, rows: Vec<T>) -> Vec<T> {
        let offset = self.offset_value().max(0) as usize;
        let iter = rows.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter.take(limit.max(0) as usize).collect(),
            None => iter.collect(),
        }
    }

    /// `$1` is always the collection name.
    pub fn to_sql(&self, collection: &str) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(collection)?;
        let mut params = where_result.params;
        let (order_clause, order_params) = FilterOrder::generate(&self.order_data, params.len());
        params.extend(order_params);
        // Insertion order breaks ties.
        let order_clause = if order_clause.is_empty() {
            "ORDER BY seq".to_string()
        } else {
            format!("{}, seq", order_clause)
        };

        let query = [
            format!("SELECT doc FROM {}", DOCUMENT_TABLE),
            format!("WHERE {}", where_result.query),
            order_clause,
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    pub fn to_where_sql(&self, collection: &str) -> Result<SqlResult, FilterError> {
        let (condition, mut params) = FilterWhere::generate(self.where_data.as_ref(), 1);
        params.insert(0, SqlParam::Text(collection.to_string()));
        Ok(SqlResult {
            query: format!("collection = $1 AND {}", condition),
            params,
        })
    }

    pub fn to_count_sql(&self, collection: &str) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(collection)?;
        Ok(SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM {} WHERE {}", DOCUMENT_TABLE, where_result.query),
            params: where_result.params,
        })
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
