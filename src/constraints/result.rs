//! Read-only result of a `find`: the page of items plus the unpaged count.

/// Items returned by a `find`, together with the count of the *unpaged*
/// matching set.
///
/// `total_count` always reflects how many rows matched before paging was
/// applied; it equals `items.len()` only when paging is off or the whole
/// match fits one page. Every backend honors this contract (the SQL backend
/// runs a separate `COUNT(*)` reusing the same filter).
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    items: Vec<T>,
    total_count: usize,
    page_number: u32,
    page_size: u32,
}

impl<T> QueryResult<T> {
    pub(crate) fn new(items: Vec<T>, total_count: usize, page_number: u32, page_size: u32) -> Self {
        QueryResult {
            items,
            total_count,
            page_number,
            page_size,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Count of the unpaged matching set.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// The 1-based page number this result was fetched with.
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// The page size this result was fetched with; 0 when unpaged.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of pages under the legacy formula.
    ///
    /// Carried over verbatim: `total / size + 1`, which reports one extra
    /// (empty) page whenever `total` divides evenly by `size`. Pinned by a
    /// test below; callers that need exact math should derive it from
    /// `total_count` themselves.
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            1
        } else {
            self.total_count / self.page_size as usize + 1
        }
    }

    /// 1-based ordinal of the first item of this page within the unpaged set.
    pub fn start_index(&self) -> usize {
        if self.page_number < 2 {
            1
        } else {
            (self.page_number as usize - 1) * self.page_size as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> IntoIterator for QueryResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
