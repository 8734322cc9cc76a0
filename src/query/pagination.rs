/// Fixed number of killmails per page.
pub const PAGE_SIZE: i64 = 100;

/// Zero-based page index. Negative input is treated as the first page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Page(u64);

impl Page {
    pub fn new(raw: i64) -> Self {
        Page(u64::try_from(raw).unwrap_or(0))
    }

    pub fn number(self) -> u64 {
        self.0
    }

    /// Records to skip before this page starts. Capped at `i64::MAX`, the
    /// largest skip the server accepts.
    pub fn skip(self) -> u64 {
        self.0
            .saturating_mul(PAGE_SIZE as u64)
            .min(i64::MAX as u64)
    }
}

impl From<Option<i64>> for Page {
    fn from(raw: Option<i64>) -> Self {
        raw.map(Page::new).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_pages_start_at_zero() {
        assert_eq!(Page::new(0).skip(), 0);
        assert_eq!(Page::new(-3).skip(), 0);
        assert_eq!(Page::from(None).number(), 0);
    }

    #[test]
    fn skip_is_page_times_size() {
        assert_eq!(Page::new(1).skip(), 100);
        assert_eq!(Page::new(7).skip(), 700);
        assert_eq!(Page::new(i64::MAX).skip(), i64::MAX as u64);
    }
}
