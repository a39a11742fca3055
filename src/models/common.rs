use serde::Serialize;

/// One page of an ordered query, newest-first. `page` is 1-based.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 20;

/// Normalize caller-supplied pagination: page is clamped to >= 1 and a zero
/// limit falls back to the default.
pub fn normalize_page(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = match limit.unwrap_or(DEFAULT_LIMIT) {
        0 => DEFAULT_LIMIT,
        n => n,
    };
    (page, limit)
}
