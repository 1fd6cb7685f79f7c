//! Page slicing for listings

use serde::Serialize;

/// Page size used when none (or zero) is requested
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    /// 1-based page number after clamping
    pub page: usize,
    /// Always at least 1, even for an empty result
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// 1-based position of the first item on this page
    pub fn first_position(&self) -> usize {
        (self.page - 1) * self.limit + 1
    }
}

/// Slice `entries` into a page, clamping out-of-range requests
pub fn paginate<T: Clone>(entries: &[T], page: Option<usize>, limit: Option<usize>) -> Page<T> {
    let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_LIMIT);
    let total = entries.len();
    let total_pages = total.div_ceil(limit).max(1);
    let page = page.unwrap_or(1).clamp(1, total_pages);

    let start = (page - 1) * limit;
    let end = (start + limit).min(total);
    let items = entries.get(start..end).map(<[T]>::to_vec).unwrap_or_default();

    Page {
        items,
        total,
        limit,
        page,
        total_pages,
    }
}
