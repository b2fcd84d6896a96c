//! Offset pagination over ordered post listings.
//!
//! Pages are 1-based. A requested page outside `1..=num_pages` is clamped to
//! the nearest valid page, and an empty collection still has one (empty) page.

use serde::Serialize;

pub const POSTS_PER_PAGE: u32 = 10;

/// Page number as requested by the client, before it is known how many pages exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedPage {
    Number(u32),
    Last,
}

impl RequestedPage {
    /// Interpret a raw `?page=` value. Missing or non-numeric input and
    /// numbers below one fall back to the first page; `last` selects the final page.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::Number(1);
        };

        if raw.eq_ignore_ascii_case("last") {
            return Self::Last;
        }

        match raw.parse::<i64>() {
            Ok(value) if value >= 1 => Self::Number(u32::try_from(value).unwrap_or(u32::MAX)),
            _ => Self::Number(1),
        }
    }
}

impl Default for RequestedPage {
    fn default() -> Self {
        Self::Number(1)
    }
}

/// The resolved slice of a listing to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: u32,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(POSTS_PER_PAGE)
    }
}

impl Paginator {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self, total: u64) -> u32 {
        if total == 0 {
            return 1;
        }
        let pages = total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn window(&self, requested: RequestedPage, total: u64) -> PageWindow {
        let num_pages = self.num_pages(total);
        let number = match requested {
            RequestedPage::Number(number) => number.clamp(1, num_pages),
            RequestedPage::Last => num_pages,
        };

        PageWindow {
            number,
            num_pages,
            total,
            offset: u64::from(number - 1) * u64::from(self.per_page),
            limit: self.per_page,
        }
    }
}

impl PageWindow {
    /// Cut this window out of an already ordered in-memory collection.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX);
        items
            .iter()
            .skip(start)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: &PageWindow) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total: window.total,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_garbage_page_defaults_to_first() {
        assert_eq!(RequestedPage::parse(None), RequestedPage::Number(1));
        assert_eq!(RequestedPage::parse(Some("abc")), RequestedPage::Number(1));
        assert_eq!(RequestedPage::parse(Some("")), RequestedPage::Number(1));
        assert_eq!(RequestedPage::parse(Some("0")), RequestedPage::Number(1));
        assert_eq!(RequestedPage::parse(Some("-4")), RequestedPage::Number(1));
        assert_eq!(RequestedPage::parse(Some(" 3 ")), RequestedPage::Number(3));
        assert_eq!(RequestedPage::parse(Some("LAST")), RequestedPage::Last);
    }

    #[test]
    fn out_of_range_pages_clamp_to_last() {
        let paginator = Paginator::default();
        let window = paginator.window(RequestedPage::Number(99), 25);

        assert_eq!(window.num_pages, 3);
        assert_eq!(window.number, 3);
        assert_eq!(window.offset, 20);
        assert_eq!(window.limit, 10);
    }

    #[test]
    fn empty_listing_has_one_empty_page() {
        let paginator = Paginator::default();
        let window = paginator.window(RequestedPage::Number(5), 0);

        assert_eq!(window.num_pages, 1);
        assert_eq!(window.number, 1);
        assert_eq!(window.offset, 0);

        let page: Page<u32> = Page::new(window.slice(&[]), &window);
        assert!(!page.has_next());
        assert!(!page.has_previous());
    }

    #[test]
    fn slices_have_page_size_except_the_last() {
        let items: Vec<u32> = (0..25).collect();
        let paginator = Paginator::default();

        let first = paginator.window(RequestedPage::Number(1), 25);
        assert_eq!(first.slice(&items), (0..10).collect::<Vec<_>>());

        let last = paginator.window(RequestedPage::Last, 25);
        assert_eq!(last.slice(&items), (20..25).collect::<Vec<_>>());
    }

    #[test]
    fn neighbours_are_reported_for_middle_pages() {
        let paginator = Paginator::default();
        let window = paginator.window(RequestedPage::Number(2), 30);
        let page = Page::new(vec![1, 2, 3], &window);

        assert_eq!(page.previous_number(), Some(1));
        assert_eq!(page.next_number(), Some(3));

        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.number, 2);
        assert_eq!(page.num_pages, 3);
    }
}
