//! Pagination and result pages.
//!
//! [`PaginationParams`] turns a 1-indexed page number into the skip/limit window
//! of a query, and [`Page`] carries one window of results together with
//! navigation metadata.

use serde::{Deserialize, Serialize};

/// A single page of paginated results.
///
/// # Example
///
/// ```ignore
/// use querylayer_core::page::Page;
///
/// let page: Page<String> = Page::builder(vec!["item1".to_string()])
///     .with_count(100)
///     .with_next_page(Some(2))
///     .build();
///
/// assert_eq!(page.items.len(), 1);
/// assert_eq!(page.count, 100);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of items across all pages.
    pub count: usize,
    /// The next page number (if more pages exist).
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page with custom settings.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Builder for constructing [`Page`] instances with fluent API.
pub struct PageBuilder<T> {
    items: Vec<T>,
    count: usize,
    next_page: Option<usize>,
    previous_page: Option<usize>,
}

impl<T> PageBuilder<T> {
    /// Creates a new builder with the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }

    /// Sets the total count of items across all pages.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the next page number (or `None` if this is the last page).
    pub fn with_next_page(mut self, next_page: Option<usize>) -> Self {
        self.next_page = next_page;
        self
    }

    /// Sets the previous page number (or `None` if this is the first page).
    pub fn with_previous_page(mut self, previous_page: Option<usize>) -> Self {
        self.previous_page = previous_page;
        self
    }

    /// Builds and returns the final [`Page`] instance.
    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// Parameters for paginating through large result sets.
///
/// Pages are 1-indexed; a page number of 0 is treated as page 1.
///
/// ```ignore
/// let params = PaginationParams::new(2, 5);
/// assert_eq!(params.offset(), 5);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Calculates the number of items to skip for this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Wraps one window of already-fetched items in a [`Page`].
    ///
    /// `total` is the number of matching items across all pages and drives the
    /// navigation metadata.
    pub fn page_of<T>(&self, items: Vec<T>, total: usize) -> Page<T> {
        let end = self.offset().saturating_add(items.len());
        let page = self.page.max(1);

        Page::builder(items)
            .with_count(total)
            .with_next_page(if end < total && self.per_page > 0 { Some(page + 1) } else { None })
            .with_previous_page(if page > 1 { Some(page - 1) } else { None })
            .build()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_page_of_five() {
        let params = PaginationParams::new(2, 5);
        assert_eq!(params.offset(), 5);

        let page = params.page_of(vec![6, 7, 8, 9, 10], 12);
        assert_eq!(page.count, 12);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
    }

    #[test]
    fn last_page_has_no_next() {
        let page = PaginationParams::new(3, 5).page_of(vec![11, 12], 12);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(2));
    }

    #[test]
    fn huge_pages_saturate_instead_of_overflowing() {
        let params = PaginationParams::new(usize::MAX, 5);
        assert_eq!(params.offset(), usize::MAX);

        let page = params.page_of(Vec::<u8>::new(), 12);
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn page_zero_behaves_like_first_page() {
        let params = PaginationParams::new(0, 5);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.page_of(vec![1, 2, 3, 4, 5], 6).next_page, Some(2));
    }
}
