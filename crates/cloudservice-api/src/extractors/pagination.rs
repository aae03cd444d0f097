//! `?page=&per_page=` query parameters.

use serde::{Deserialize, Serialize};

use cloudservice_core::types::pagination::PageRequest;

/// Largest page an HTTP caller may ask for.
const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationParams {
    /// 1-based.
    pub page: u64,
    pub per_page: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 25 }
    }
}

impl PaginationParams {
    pub fn into_page_request(self) -> PageRequest {
        PageRequest::new(self.page, self.per_page.min(MAX_PER_PAGE))
    }
}
