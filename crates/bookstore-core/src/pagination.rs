//! Page requests and pagination metadata for list endpoints.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Clamps page to ≥ 1 and limit to 1..=100.
    pub fn new(page: u32, limit: u32) -> Self {
        PageRequest {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip.
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.limit as i64
    }
}

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: i64,
    pub items_per_page: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total_items: i64) -> Self {
        let limit = request.limit.max(1) as i64;
        let total_items = total_items.max(0);
        let total_pages = (total_items + limit - 1) / limit;

        Pagination {
            current_page: request.page,
            total_pages: total_pages as u32,
            total_items,
            items_per_page: request.limit,
            has_next: (request.page as i64) * limit < total_items,
            has_previous: request.page > 1,
        }
    }
}

/// One page of `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: i64) -> Self {
        Page {
            items,
            pagination: Pagination::new(request, total_items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_metadata() {
        let meta = Pagination::new(PageRequest::new(2, 10), 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_previous);

        let last = Pagination::new(PageRequest::new(3, 10), 25);
        assert!(!last.has_next);

        let exact = Pagination::new(PageRequest::new(2, 10), 20);
        assert_eq!(exact.total_pages, 2);
        assert!(!exact.has_next);
    }

    #[test]
    fn test_empty_result() {
        let meta = Pagination::new(PageRequest::default(), 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_previous);
    }

    #[test]
    fn test_request_clamping_and_offset() {
        let req = PageRequest::new(0, 500);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 0);

        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }
}
