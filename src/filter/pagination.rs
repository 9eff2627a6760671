use serde::Serialize;

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Page defaults to 1 (0 is treated as 1); per_page defaults and is clamped to `1..=max`.
    pub fn resolve(page: Option<u32>, per_page: Option<u32>, default_per_page: u32, max_per_page: u32) -> Self {
        let max_per_page = max_per_page.max(1);
        let per_page = per_page
            .unwrap_or(default_per_page)
            .clamp(1, max_per_page);
        Self {
            page: page.unwrap_or(1).max(1),
            per_page,
        }
    }

    pub fn from_config(page: Option<u32>, per_page: Option<u32>) -> Self {
        let api = &config::config().api;
        Self::resolve(page, per_page, api.default_per_page, api.max_per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Page;

    #[test]
    fn applies_defaults_and_bounds() {
        assert_eq!(Pagination::resolve(None, None, 20, 100), Pagination { page: 1, per_page: 20 });
        assert_eq!(Pagination::resolve(Some(0), Some(0), 20, 100), Pagination { page: 1, per_page: 1 });
        assert_eq!(Pagination::resolve(Some(3), Some(500), 20, 100), Pagination { page: 3, per_page: 100 });
    }

    #[test]
    fn computes_offsets() {
        let p = Pagination::resolve(Some(3), Some(25), 20, 100);
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn page_counts_round_up() {
        let p = Pagination::resolve(Some(1), Some(10), 20, 100);
        assert_eq!(Page::new(vec![1; 10], 21, &p).total_pages, 3);
        assert_eq!(Page::new(vec![1; 10], 20, &p).total_pages, 2);
        assert_eq!(Page::<i32>::new(vec![], 0, &p).total_pages, 0);
    }
}
