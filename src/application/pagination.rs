//! Offset pagination shared by the public feed, author drafts and the JSON API.

use serde::Serialize;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 3;

/// A validated page position: both `page` and `per_page` are at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    per_page: u64,
}

impl PageRequest {
    pub fn new(page: u64, per_page: u64) -> Option<Self> {
        (page >= 1 && per_page >= 1).then_some(Self { page, per_page })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Rows to skip and take from the ordered result set.
    pub fn window(&self) -> PageWindow {
        PageWindow {
            skip: (self.page - 1).saturating_mul(self.per_page),
            take: self.per_page,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub take: u64,
}

/// Pagination metadata for one page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub pages_count: u64,
    pub current_page: u64,
    pub per_page: u64,
    pub from: u64,
    pub to: u64,
    pub has_more: bool,
}

impl PageMeta {
    /// Compute metadata for `request` against a listing of `total` rows.
    ///
    /// Pages past the end produce an empty slice: `from` and `to` are zero and
    /// `has_more` is false.
    pub fn compute(total: u64, request: PageRequest) -> Self {
        let pages_count = total.div_ceil(request.per_page);
        let offset = request.window().skip;
        let on_page = total.saturating_sub(offset).min(request.per_page);

        let (from, to) = if on_page == 0 {
            (0, 0)
        } else {
            (offset + 1, offset + on_page)
        };

        Self {
            total,
            pages_count,
            current_page: request.page,
            per_page: request.per_page,
            from,
            to,
            has_more: request.page < pages_count,
        }
    }

    /// Clamp `from`/`to` to the rows actually returned by the fetch.
    ///
    /// The count and the fetch are separate reads, so rows can disappear in between.
    pub fn bounded_by(self, returned: usize) -> Self {
        let returned = returned as u64;
        if returned == 0 {
            return Self {
                from: 0,
                to: 0,
                ..self
            };
        }

        let from = if self.from == 0 {
            (self.current_page - 1)
                .saturating_mul(self.per_page)
                .saturating_add(1)
        } else {
            self.from
        };
        let to = (from.saturating_add(returned) - 1).min(if self.to == 0 { u64::MAX } else { self.to });

        Self { from, to, ..self }
    }

    /// Page numbers to link from a pager; empty when there is at most one page.
    pub fn page_numbers(&self) -> Vec<u64> {
        if self.pages_count <= 1 {
            return Vec::new();
        }
        (1..=self.pages_count).collect()
    }

    pub fn previous_page(&self) -> Option<u64> {
        (self.current_page > 1).then(|| (self.current_page - 1).min(self.pages_count.max(1)))
    }

    pub fn next_page(&self) -> Option<u64> {
        self.has_more.then_some(self.current_page + 1)
    }
}

/// One page of items plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, meta: PageMeta) -> Self {
        let meta = meta.bounded_by(items.len());
        Self { items, meta }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
