//! Page-number pagination over ordered, lazily fetched result sets.
//!
//! The caller counts the result set, asks the [`Paginator`] for a [`PageWindow`], fetches
//! only `limit` rows starting at `offset`, and finally wraps them into a [`Page`].

use serde::Serialize;
use std::num::NonZeroU64;

pub const POSTS_PER_PAGE: NonZeroU64 = NonZeroU64::new(10).unwrap();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Paginator {
    per_page: NonZeroU64,
}

/// Location of one page inside a result set of known size.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: NonZeroU64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Paginator {
    #[must_use]
    pub const fn new(per_page: NonZeroU64) -> Self {
        Self { per_page }
    }

    #[must_use]
    pub const fn per_page(self) -> NonZeroU64 {
        self.per_page
    }

    #[must_use]
    pub fn num_pages(self, count: u64) -> u64 {
        // An empty result set still has one (empty) page.
        count.div_ceil(self.per_page.get()).max(1)
    }

    /// Resolves the raw `page` query value against a result set of `count` items.
    ///
    /// Missing or unparsable values select the first page, values below one select the first
    /// page and values past the end select the last page.
    #[must_use]
    pub fn locate(self, count: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = requested_page(requested).min(num_pages);

        PageWindow {
            number,
            num_pages,
            count,
            per_page: self.per_page,
        }
    }
}

/// Normalizes a raw `page` query value before the result set size is known.
///
/// Digit strings too large for `u64` saturate, so they still land on the last page once
/// clamped. Anything else that is not a positive integer is page one.
#[must_use]
pub fn requested_page(requested: Option<&str>) -> u64 {
    let Some(raw) = requested else {
        return 1;
    };
    let digits = raw.trim();
    let digits = digits.strip_prefix('+').unwrap_or(digits);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return 1;
    }

    digits.parse::<u64>().unwrap_or(u64::MAX).max(1)
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(POSTS_PER_PAGE)
    }
}

impl PageWindow {
    #[must_use]
    pub fn offset(self) -> u64 {
        (self.number - 1) * self.per_page.get()
    }

    #[must_use]
    pub fn limit(self) -> u64 {
        self.per_page.get()
    }

    #[must_use]
    pub fn has_next(self) -> bool {
        self.number < self.num_pages
    }

    #[must_use]
    pub fn has_previous(self) -> bool {
        self.number > 1
    }

    #[must_use]
    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next(),
            has_previous: self.has_previous(),
        }
    }
}

impl<T> Page<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}
