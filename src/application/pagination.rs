//! Page-number pagination with clamping.
//!
//! Feeds are paginated by 1-based page number. Out-of-range requests never
//! fail: a page past the end clamps to the last valid page, and anything
//! below 1 clamps to the first. An empty result set is page 1 of 1.

use std::num::NonZeroU32;

/// Window handed to repositories: `LIMIT limit OFFSET offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// Fixed-size paginator. Page size is configuration, not a process-wide
/// constant.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: NonZeroU32,
}

impl Paginator {
    pub fn new(page_size: NonZeroU32) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    /// Total number of pages for `total_items`, never less than 1.
    pub fn total_pages(&self, total_items: u64) -> u32 {
        let size = u64::from(self.page_size.get());
        let pages = total_items.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Clamp a requested page number into `1..=total_pages`.
    pub fn clamp_page(&self, requested: u32, total_items: u64) -> u32 {
        requested.clamp(1, self.total_pages(total_items))
    }

    /// The repository window for an already-clamped page number.
    pub fn window(&self, page: u32) -> PageWindow {
        let size = i64::from(self.page_size.get());
        PageWindow {
            limit: size,
            offset: size * i64::from(page.saturating_sub(1)),
        }
    }
}

/// A bounded slice of an ordered result set plus paging metadata.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn assemble(items: Vec<T>, number: u32, paginator: &Paginator, total_items: u64) -> Self {
        Self {
            items,
            number,
            total_pages: paginator.total_pages(total_items),
            total_items,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            number: 1,
            total_pages: 1,
            total_items: 0,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
