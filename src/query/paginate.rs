use std::ops::Range;

use serde::Serialize;

/// Page window over `total` items. Pages are 1-based and clamped into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total: usize,
    pub page_count: u64,
}

impl Pagination {
    pub fn new(total: usize, page: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let page_count = (total as u64).div_ceil(page_size).max(1);
        Self {
            page: page.clamp(1, page_count),
            page_size,
            total,
            page_count,
        }
    }

    pub fn range(&self) -> Range<usize> {
        let start = ((self.page - 1) * self.page_size).min(self.total as u64) as usize;
        let end = (start as u64 + self.page_size).min(self.total as u64) as usize;
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.range();
        &items[range.start.min(items.len())..range.end.min(items.len())]
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }
}
