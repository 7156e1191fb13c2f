//! This module defines the common functionality for paging list endpoints.

use serde::Deserialize;

/// The config that controls how list endpoints page their data.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of rows to return per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may request.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// The pagination query parameters accepted by list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    /// The one-based page number.
    pub page: Option<u64>,
    /// The number of rows per page.
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Resolve the raw query parameters into a SQL LIMIT and OFFSET.
    ///
    /// Missing values fall back to the config defaults, a page of zero is
    /// treated as page one, and the page size is capped at the config's
    /// maximum.
    pub(crate) fn to_limit_offset(&self, config: &PaginationConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(config.default_page).max(1);
        let page_size = self
            .per_page
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size);

        (page_size, (page - 1) * page_size)
    }
}
