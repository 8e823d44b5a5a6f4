/// Offset pagination
///
/// Page numbers are 1-based. Page `p` with size `s` covers rows
/// `[(p - 1) * s, p * s)` and the page count is `ceil(total / s)`.
///
/// # Example
///
/// ```
/// use teamboard_shared::pagination::PageRequest;
///
/// let page = PageRequest::new(Some(3), Some(6));
/// assert_eq!(page.offset(), 12);
/// assert_eq!(page.total_pages(13), 3);
/// ```

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not send `limit`
pub const DEFAULT_PAGE_SIZE: u32 = 6;

/// Upper bound on `limit`
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters accepted by paginated listings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Normalized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,

    /// Rows per page, in `1..=MAX_PAGE_SIZE`
    pub limit: u32,
}

impl PageRequest {
    /// Builds a request, clamping missing or out-of-range values
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Number of rows skipped before this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Number of pages needed for `total` rows
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }

    /// Slices an already ordered, fully materialized list
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX).min(items.len());
        let end = start.saturating_add(self.limit as usize).min(items.len());
        &items[start..end]
    }
}

impl From<PageQuery> for PageRequest {
    fn from(query: PageQuery) -> Self {
        PageRequest::new(query.page, query.limit)
    }
}

/// One page of rows plus the totals needed to render a pager
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        Self {
            items,
            current_page: request.page,
            total_pages: request.total_pages(total_count),
            total_count,
        }
    }

    /// Paginates a fully materialized, ordered list
    pub fn from_all(all: Vec<T>, request: PageRequest) -> Self
    where
        T: Clone,
    {
        let total = all.len() as u64;
        let items = request.slice(&all).to_vec();
        Self::new(items, request, total)
    }
}
