//! Translation of bulk listing requests into store queries.

pub mod filter;
pub mod pagination;

use rocket_db_pools::mongodb::bson::{Document, doc};

pub use filter::{EntityKind, FilterMode, KillmailFilter};
pub use pagination::{PAGE_SIZE, Page};

/// A fully-specified bulk query: predicate, ordering and window.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkQuery {
    pub filter: Document,
    pub sort: Document,
    pub skip: u64,
    pub limit: i64,
}

impl BulkQuery {
    /// Newest killmails first, one page at a time.
    pub fn new(filter: &KillmailFilter, page: Page, mode: FilterMode) -> Self {
        Self {
            filter: filter.to_document(mode),
            sort: doc! { "_id": -1 },
            skip: page.skip(),
            limit: PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_page_skips_one_page() {
        let query = BulkQuery::new(&KillmailFilter::default(), Page::new(1), FilterMode::default());
        assert_eq!(query.skip, 100);
        assert_eq!(query.limit, 100);
        assert_eq!(query.sort, doc! { "_id": -1 });
        assert_eq!(query.filter, doc! { "axiom": { "$exists": true } });
    }
}
