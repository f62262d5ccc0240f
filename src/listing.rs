//! Newest-first ordering and pagination of document lists.

use crate::document::Document;

/// Field used as the "most recent first" sort key.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// One page of a listing, with the number of documents before paging.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub documents: Vec<Document>,
    pub total: usize,
}

/// Sorts documents by `createdAt`, newest first.
///
/// ISO-8601 timestamps compare chronologically as strings. Documents
/// without a timestamp sort last; the sort is stable.
pub fn sort_newest_first(docs: &mut [Document]) {
    docs.sort_by(|a, b| {
        let a = a.str_field(CREATED_AT_FIELD).unwrap_or("");
        let b = b.str_field(CREATED_AT_FIELD).unwrap_or("");
        b.cmp(a)
    });
}

/// Cuts the 1-based `page` of `limit` documents out of `docs`.
///
/// A page of 0 is treated as page 1; a limit of 0 yields an empty page.
pub fn paginate(docs: Vec<Document>, page: usize, limit: usize) -> Page {
    let total = docs.len();
    let start = page.max(1).saturating_sub(1).saturating_mul(limit);
    let documents = docs.into_iter().skip(start).take(limit).collect();
    Page { documents, total }
}

/// Newest-first then paginated.
pub fn newest_page(mut docs: Vec<Document>, page: usize, limit: usize) -> Page {
    sort_newest_first(&mut docs);
    paginate(docs, page, limit)
}
