//! Offset pagination metadata shared by catalog sources and the loader.

use vitrine_api_types::{Product, ProductResponse};

/// One fetched batch of items plus the pagination metadata it arrived with.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-based index of this page.
    pub page_number: u32,
    pub page_size: u32,
    /// Total matching items across all pages; stable for one query.
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page_number: u32, page_size: u32, total_count: u64) -> Self {
        Self {
            items,
            page_number,
            page_size,
            total_count,
        }
    }

    /// `ceil(total_count / page_size)`, or 1 for a degenerate page size.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 1;
        }
        self.total_count.div_ceil(u64::from(self.page_size))
    }

    /// Whether a page after this one exists.
    pub fn has_more(&self) -> bool {
        if self.page_size == 0 {
            return false;
        }
        u64::from(self.page_number) + 1 < self.total_pages()
    }
}

impl From<ProductResponse> for Page<Product> {
    fn from(response: ProductResponse) -> Self {
        Self {
            items: response.data,
            page_number: response.pagination.page,
            page_size: response.pagination.limit,
            total_count: response.pagination.total,
        }
    }
}
