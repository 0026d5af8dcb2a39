//! Pagination, filtering and sorting parameters for list queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(ParseError::new("sort direction", s)),
        }
    }
}

/// A requested sort: an external field name plus a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A page of a filtered, optionally sorted list.
///
/// Filter keys are external field names; each entity whitelists the names it
/// accepts. Multiple values for one key match any of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            filters: BTreeMap::new(),
            sort: None,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    /// Add a filter value. Repeated calls for the same field accumulate.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters
            .entry(field.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of results plus the navigation data derived from the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub total_pages: u64,
    pub current_page: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, total_items: u64, request: &PageRequest) -> Self {
        let page_size = u64::from(request.page_size.max(1));
        let total_pages = total_items.div_ceil(page_size);
        Self {
            items,
            total_items,
            total_pages,
            current_page: request.page,
            has_next: u64::from(request.page) < total_pages,
            has_prev: request.page > 1,
        }
    }

    /// Convert the items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResponse<U> {
        PageResponse {
            items: self.items.into_iter().map(f).collect(),
            total_items: self.total_items,
            total_pages: self.total_pages,
            current_page: self.current_page,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of(total: u64, page: u32, size: u32) -> PageResponse<()> {
        PageResponse::new(Vec::new(), total, &PageRequest::new(page, size))
    }

    #[test]
    fn first_page_has_next_only() {
        let page = page_of(5, 1, 2);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn last_page_has_prev_only() {
        let page = page_of(5, 3, 2);
        assert!(!page.has_next);
        assert!(page.has_prev);
    }

    #[test]
    fn empty_result_has_no_pages() {
        let page = page_of(0, 1, 10);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest::new(1, 25).offset(), 0);
        assert_eq!(PageRequest::new(3, 25).offset(), 50);
    }

    #[test]
    fn filters_accumulate_per_field() {
        let request = PageRequest::new(1, 10)
            .with_filter("state", "pending")
            .with_filter("state", "failed");
        assert_eq!(request.filters["state"], vec!["pending", "failed"]);
    }
}
