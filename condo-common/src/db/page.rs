//! Pagination shared by every listing

use serde::Serialize;

/// Default page size for listings
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: i64 = 500;

/// Requested page, before clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Clamp the page into `[1, total_pages]` and compute the SQL offset
    pub fn resolve(&self, total: i64) -> Pagination {
        let page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        let total_pages = (total + page_size - 1) / page_size;
        let page = self.page.max(1).min(total_pages.max(1));
        Pagination {
            page,
            page_size,
            total_pages,
            offset: (page - 1) * page_size,
        }
    }
}

/// Pagination metadata calculated from total results and requested page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: pagination.total_pages,
        }
    }
}
