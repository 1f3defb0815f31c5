//! Page/limit pagination helpers.

use serde::Serialize;

/// Upper bound for any page size requested by a client.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A normalized, 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    limit: i64,
}

impl PageRequest {
    /// Normalizes raw query values: page defaults to 1 and is at least 1;
    /// limit falls back to `default_limit` and is clamped to 1..=MAX_PAGE_SIZE.
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Pagination block returned alongside list responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let pages = (total + request.limit - 1) / request.limit;
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages,
        }
    }
}
