//! Pagination types for list operations.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// Normalized page request (1-indexed page, clamped limit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    limit: u64,
}

impl PageRequest {
    /// Build a page request. Missing or zero values fall back to defaults
    /// and the limit is capped at [`MAX_PAGE_LIMIT`]. The page is capped so
    /// that `page * limit` fits a signed 64-bit SQL offset.
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT);
        let page = page
            .filter(|p| *p > 0)
            .unwrap_or(DEFAULT_PAGE)
            .min(i64::MAX as u64 / limit);
        Self { page, limit }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Calculate offset for database query
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Search and page parameters for listing users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Raw free-text filter, matched against name and email
    pub search: Option<String>,
    pub page: PageRequest,
}

impl ListQuery {
    pub fn new(search: Option<String>, page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            search,
            page: PageRequest::new(page, limit),
        }
    }
}

/// Pagination metadata returned alongside list results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page(),
            limit: request.limit(),
            total,
            total_pages: total.div_ceil(request.limit()),
        }
    }
}
