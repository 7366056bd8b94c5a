//! In-memory pagination
//!
//! The engine keeps the full fetched row set in memory; the paginator only
//! slices it into fixed-size pages. Pages are 1-based.

/// Fixed-size page navigation over an in-memory row set
#[derive(Debug, Clone)]
pub struct Paginator {
    page_size: usize,
    current: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current: 1,
        }
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.current = 1;
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Total pages for a row set of `len`; at least 1 even when empty
    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size).max(1)
    }

    /// Jump to a page, clamping into `[1, total_pages]`
    pub fn go_to(&mut self, page: usize, len: usize) -> usize {
        self.current = page.clamp(1, self.total_pages(len));
        self.current
    }

    pub fn next(&mut self, len: usize) -> usize {
        self.go_to(self.current + 1, len)
    }

    pub fn prev(&mut self, len: usize) -> usize {
        self.go_to(self.current.saturating_sub(1), len)
    }

    /// Back to page 1; called whenever a fetch commits a new row set
    pub fn reset(&mut self) {
        self.current = 1;
    }

    /// The current page's slice of `rows`
    ///
    /// A current page beyond the end (row set shrank underneath us) yields
    /// an empty slice rather than panicking; callers re-clamp via `go_to`.
    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let start = (self.current - 1).saturating_mul(self.page_size);
        let end = start.saturating_add(self.page_size).min(rows.len());
        if start >= rows.len() {
            &[]
        } else {
            &rows[start..end]
        }
    }
}
