//! Splits an ordered collection into fixed-size pages.
//!
//! Page numbers are 1-based. Requests outside the valid range are clamped
//! to the nearest page instead of failing, and an empty collection still
//! has a single empty page.

pub const PER_PAGE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    pub count: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Paginator {
        Paginator {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolves a raw `page` query value. Anything that is not an integer
    /// means the first page.
    pub fn get_page(&self, raw: Option<&str>) -> PageWindow {
        self.page(Paginator::requested(raw))
    }

    /// The page number a raw query value asks for, before clamping to the
    /// last page.
    pub fn requested(raw: Option<&str>) -> i64 {
        raw.and_then(|r| r.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1)
    }

    pub fn page(&self, number: i64) -> PageWindow {
        let num_pages = self.num_pages();
        PageWindow {
            number: number.max(1).min(num_pages),
            num_pages,
            count: self.count,
            per_page: self.per_page,
        }
    }
}

impl PageWindow {
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<i64> {
        if self.has_next() {
            Some(self.number + 1)
        } else {
            None
        }
    }

    pub fn previous_page_number(&self) -> Option<i64> {
        if self.has_previous() {
            Some(self.number - 1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleven_items_span_two_pages() {
        let paginator = Paginator::new(11, PER_PAGE);
        assert_eq!(paginator.num_pages(), 2);

        let first = paginator.page(1);
        assert_eq!(first.offset(), 0);
        assert_eq!(first.limit(), 10);
        assert!(first.has_next());
        assert!(!first.has_previous());
        assert_eq!(first.next_page_number(), Some(2));

        let second = paginator.page(2);
        assert_eq!(second.offset(), 10);
        assert!(!second.has_next());
        assert_eq!(second.previous_page_number(), Some(1));
    }

    #[test]
    fn out_of_range_pages_clamp() {
        let paginator = Paginator::new(25, PER_PAGE);
        assert_eq!(paginator.page(99).number, 3);
        assert_eq!(paginator.page(0).number, 1);
        assert_eq!(paginator.page(-4).number, 1);
    }

    #[test]
    fn garbage_page_values_mean_first_page() {
        let paginator = Paginator::new(25, PER_PAGE);
        assert_eq!(paginator.get_page(None).number, 1);
        assert_eq!(paginator.get_page(Some("abc")).number, 1);
        assert_eq!(paginator.get_page(Some("2")).number, 2);
        assert_eq!(paginator.get_page(Some("last")).number, 1);
    }

    #[test]
    fn requested_numbers_are_normalized() {
        assert_eq!(Paginator::requested(None), 1);
        assert_eq!(Paginator::requested(Some(" 3 ")), 3);
        assert_eq!(Paginator::requested(Some("-2")), 1);
        assert_eq!(Paginator::requested(Some("x")), 1);
    }

    #[test]
    fn empty_collection_has_one_empty_page() {
        let paginator = Paginator::new(0, PER_PAGE);
        assert_eq!(paginator.num_pages(), 1);
        let page = paginator.get_page(Some("7"));
        assert_eq!(page.number, 1);
        assert_eq!(page.offset(), 0);
        assert!(!page.has_next());
    }
}
