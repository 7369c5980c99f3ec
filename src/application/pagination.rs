//! Offset pagination over ordered listings.
//!
//! Listings are sliced into fixed-size pages addressed by a 1-based page
//! number taken from the `page` query parameter. Requests never fail on the
//! page number: anything unparsable means page 1, anything past the end means
//! the last page.

use std::num::IntErrorKind;

pub const PAGE_SIZE: u32 = 10;

/// A page number as requested by the client, already coerced to `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber(u64);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(1);

    /// Interpret a raw `page` query value.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::FIRST;
        };

        match raw.parse::<i64>() {
            Ok(value) if value >= 1 => Self(value as u64),
            Ok(_) => Self::FIRST,
            Err(err) if *err.kind() == IntErrorKind::PosOverflow => Self(u64::MAX),
            Err(_) => Self::FIRST,
        }
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

/// The slice of rows a repository should return for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

/// Page metadata needed to render previous/next links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub per_page: u32,
}

impl PageMeta {
    pub fn window(&self) -> PageWindow {
        PageWindow {
            offset: (self.number - 1).saturating_mul(u64::from(self.per_page)),
            limit: self.per_page,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_previous() || self.has_next()
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    /// 1-based index of the first item on this page, 0 for an empty listing.
    pub fn start_index(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.window().offset + 1
        }
    }

    /// 1-based index of the last item on this page.
    pub fn end_index(&self) -> u64 {
        if self.number == self.num_pages {
            self.total
        } else {
            self.number * u64::from(self.per_page)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: u64,
    per_page: u32,
}

impl Paginator {
    pub fn new(total: u64, per_page: u32) -> Self {
        Self {
            total,
            per_page: per_page.max(1),
        }
    }

    /// Total pages; an empty listing still has one (empty) page.
    pub fn num_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page)).max(1)
    }

    /// Clamp the requested page into `1..=num_pages`.
    pub fn resolve(&self, requested: PageNumber) -> PageMeta {
        let num_pages = self.num_pages();
        PageMeta {
            number: requested.get().clamp(1, num_pages),
            num_pages,
            total: self.total,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
