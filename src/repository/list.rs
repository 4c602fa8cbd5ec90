use serde::Serialize;

use crate::config::ListingConfig;
use crate::filter::filter_order::FilterOrder;
use crate::filter::{Filter, Predicate};
use crate::services::MetaError;
use crate::types::Document;

/// Query parameters shared by every list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub sort_key: Option<String>,
    pub sort_order: i64,
    pub per_page: Option<i64>,
    pub page: i64,
    pub search: Option<String>,
    pub search_keys: Vec<String>,
    /// File listings only; `None` or `*` means every record.
    pub record_id: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            sort_key: None,
            sort_order: 1,
            per_page: None,
            page: 1,
            search: None,
            search_keys: vec![],
            record_id: None,
        }
    }
}

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub per_page: i64,
}

impl PageWindow {
    /// Rows before this page. Windows built by `ListParams::window` never
    /// overflow; anything else saturates.
    pub fn offset(&self) -> i64 {
        self.per_page.saturating_mul(self.page.saturating_sub(1))
    }
}

impl ListParams {
    /// `page` and `per_page` must be at least 1; `per_page` is capped at
    /// the configured maximum.
    pub fn window(&self, listing: &ListingConfig) -> Result<PageWindow, MetaError> {
        let per_page = self.per_page.unwrap_or(listing.default_per_page);
        if per_page < 1 {
            return Err(MetaError::InvalidData(format!("per_page must be positive, got {}", per_page)));
        }
        if self.page < 1 {
            return Err(MetaError::InvalidData(format!("page must be positive, got {}", self.page)));
        }
        let per_page = match listing.max_per_page {
            Some(max) if per_page > max => {
                tracing::warn!("per_page {} exceeds max {}, capping to max", per_page, max);
                max
            }
            _ => per_page,
        };
        if per_page.checked_mul(self.page - 1).is_none() {
            return Err(MetaError::InvalidData(format!(
                "page {} is out of range for per_page {}",
                self.page, per_page
            )));
        }
        Ok(PageWindow { page: self.page, per_page })
    }

    /// Columns a bare search term is matched against.
    pub fn search_columns(&self, default_key: &str) -> Vec<String> {
        if self.search_keys.is_empty() {
            vec![default_key.to_string()]
        } else {
            self.search_keys.clone()
        }
    }

    /// Builds the unpaged filter for a listing: parsed search, extra
    /// condition and a validated sort order. Returns the sort key used.
    pub fn to_filter(
        &self,
        default_key: &str,
        sortable: &[String],
        extra: Option<Predicate>,
    ) -> Result<(Filter, String), MetaError> {
        let sort_key = self.sort_key.clone().unwrap_or_else(|| default_key.to_string());
        let order = FilterOrder::validate_and_parse(&sort_key, self.sort_order, sortable)?;
        let search = crate::filter::parse_search_keyword(self.search.as_deref(), &self.search_columns(default_key))?;

        let mut filter = Filter::new();
        filter.where_clause(extra).where_clause(search).order(order);
        Ok((filter, sort_key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResponse {
    pub data: Vec<Document>,
    pub page: i64,
    pub per_page: i64,
    pub number_of_pages: i64,
    pub sort_key: String,
    pub length: usize,
    pub total: usize,
}

impl ListResponse {
    pub fn new(data: Vec<Document>, window: PageWindow, sort_key: String, total: usize) -> Self {
        let total_i = total as i64;
        Self {
            length: data.len(),
            data,
            page: window.page,
            per_page: window.per_page,
            number_of_pages: total_i / window.per_page + i64::from(total_i % window.per_page != 0),
            sort_key,
            total,
        }
    }

    /// Pages an already filtered, ordered list.
    pub fn paginate(rows: Vec<Document>, window: PageWindow, sort_key: String) -> Self {
        let total = rows.len();
        let data = rows
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.per_page as usize)
            .collect();
        Self::new(data, window, sort_key, total)
    }

    pub fn map_data(mut self, f: impl FnMut(Document) -> Document) -> Self {
        self.data = self.data.into_iter().map(f).collect();
        self
    }
}
