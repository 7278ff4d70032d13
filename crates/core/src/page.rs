//! Offset pagination as exposed to API callers.
//!
//! The identity platform pages with `page`/`per_page` and reports totals as
//! `start`/`limit`/`total`; these types normalize both directions.

use serde::{Deserialize, Serialize};

/// Page size used when the caller asks for less than one item.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Requested page (0-based) and page size.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Build a request from raw caller input.
    ///
    /// Negative pages clamp to 0; sizes below 1 fall back to [`DEFAULT_PAGE_SIZE`].
    pub fn normalized(page: i64, size: i64) -> Self {
        let page = u32::try_from(page.max(0)).unwrap_or(u32::MAX);
        let size = if size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            u32::try_from(size).unwrap_or(u32::MAX)
        };
        Self { page, size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    /// Page built from the caller's own request and the reported total.
    pub fn from_request(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            current_page: request.page,
            page_size: request.size,
            total_pages: pages_for(total_elements, request.size),
            total_elements,
        }
    }

    /// Page built from the window the platform reports back (`start`/`limit`).
    ///
    /// Without a reported limit the page size is the number of items returned.
    pub fn from_window(
        content: Vec<T>,
        start: Option<u64>,
        limit: Option<u32>,
        total_elements: u64,
    ) -> Self {
        let page_size = limit.unwrap_or_else(|| u32::try_from(content.len()).unwrap_or(u32::MAX));
        let current_page = start
            .map(|s| s / u64::from(page_size.max(1)))
            .map(|p| u32::try_from(p).unwrap_or(u32::MAX))
            .unwrap_or(0);
        let total_pages = if page_size > 0 {
            pages_for(total_elements, page_size)
        } else if total_elements > 0 {
            1
        } else {
            0
        };

        Self {
            content,
            current_page,
            page_size,
            total_pages,
            total_elements,
        }
    }

    /// Everything in one page (unpaginated upstream collections).
    pub fn single(content: Vec<T>) -> Self {
        let total = content.len();
        Self {
            current_page: 0,
            page_size: u32::try_from(total).unwrap_or(u32::MAX),
            total_pages: u32::from(total > 0),
            total_elements: total as u64,
            content,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            current_page: self.current_page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            total_elements: self.total_elements,
        }
    }
}

fn pages_for(total: u64, size: u32) -> u32 {
    if size == 0 {
        return 0;
    }
    u32::try_from(total.div_ceil(u64::from(size))).unwrap_or(u32::MAX)
}
