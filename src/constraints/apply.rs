//! In-memory application of sort and page constraints.
//!
//! The composition order is fixed: **sort, then page**. Includes never run
//! here; they apply at the backend's materialization layer and affect
//! neither item order nor counts.

use crate::constraints::{QueryConstraints, QueryResult, SortOrder};
use crate::record::Record;
use crate::value::Value;

impl QueryConstraints {
    /// Apply sorting and paging to an in-memory sequence.
    ///
    /// Sorting projects each element's sort property through
    /// [`Record::get`] (absent values order as nulls, first) and uses the
    /// standard library's stable sort, so ties keep their incoming order.
    /// Paging then skips `(page_number - 1) * page_size` elements and takes
    /// `page_size`; a page size of 0 returns everything.
    ///
    /// The returned [`QueryResult::total_count`] is the length of the input,
    /// i.e. the unpaged matching set.
    pub fn apply<T: Record>(&self, mut items: Vec<T>) -> QueryResult<T> {
        let total = items.len();

        if let (Some(property), order) = (self.sort_property(), self.sort_order()) {
            if order != SortOrder::Unspecified {
                items.sort_by(|a, b| {
                    let left = a.get(property).unwrap_or(Value::Null);
                    let right = b.get(property).unwrap_or(Value::Null);
                    let ordering = left.cmp(&right);
                    match order {
                        SortOrder::Descending => ordering.reverse(),
                        _ => ordering,
                    }
                });
            }
        }

        if self.page_size() > 0 {
            let skip = (self.page_number() as usize - 1) * self.page_size() as usize;
            items = items
                .into_iter()
                .skip(skip)
                .take(self.page_size() as usize)
                .collect();
        }

        QueryResult::new(items, total, self.page_number(), self.page_size())
    }
}

#[cfg(test)]
mod tests {
    use crate::constraints::QueryConstraints;
    use crate::record::Record;
    use crate::schema::{Schema, ScalarType};
    use crate::value::Value;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        name: String,
        grade: Option<i64>,
    }

    impl Record for Item {
        fn get(&self, property: &str) -> Option<Value> {
            match property {
                "id" => Some(Value::Int(self.id)),
                "name" => Some(Value::Text(self.name.clone())),
                "grade" => Some(self.grade.into()),
                _ => None,
            }
        }
    }

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .entity("item", "items", |e| {
                    e.scalar("id", ScalarType::Int64)
                        .scalar("name", ScalarType::Text)
                        .scalar("grade", ScalarType::Int64)
                })
                .build()
                .unwrap(),
        )
    }

    fn items(n: i64) -> Vec<Item> {
        (1..=n)
            .map(|i| Item {
                id: i,
                name: i.to_string(),
                grade: Some(i % 3),
            })
            .collect()
    }

    fn constraints() -> QueryConstraints {
        QueryConstraints::for_entity(schema(), "item").unwrap()
    }

    #[test]
    fn test_default_constraints_pass_through() {
        let result = constraints().apply(items(5));
        assert_eq!(result.len(), 5);
        assert_eq!(result.total_count(), 5);
        assert_eq!(result.items()[0].id, 1);
    }

    #[test]
    fn test_sort_then_page_order() {
        // Descending by id, then page 1 of 3: must be 10, 9, 8. Paging a
        // pre-sorted sequence, never sorting a page.
        let result = constraints()
            .sort_by_descending("id")
            .unwrap()
            .page(1, 3)
            .unwrap()
            .apply(items(10));
        let ids: Vec<i64> = result.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![10, 9, 8]);
        assert_eq!(result.total_count(), 10);
    }

    #[test]
    fn test_descending_ties_keep_insertion_order() {
        // grade cycles 1,2,0,...; stable sort keeps ties in insertion order
        let result = constraints()
            .sort_by_descending("grade")
            .unwrap()
            .apply(items(9));
        let twos: Vec<i64> = result
            .items()
            .iter()
            .filter(|i| i.grade == Some(2))
            .map(|i| i.id)
            .collect();
        assert_eq!(twos, vec![2, 5, 8]);
    }

    #[test]
    fn test_paging_exactness() {
        // N = 10, page(p, s): count == max(0, min(s, N - (p-1)*s))
        for (page, size, expected) in [(1u32, 4u32, 4usize), (2, 4, 4), (3, 4, 2), (4, 4, 0)] {
            let result = constraints()
                .page(page, size)
                .unwrap()
                .apply(items(10));
            assert_eq!(result.len(), expected, "page {page} size {size}");
            assert_eq!(result.total_count(), 10);
        }
    }

    #[test]
    fn test_page_size_zero_returns_everything() {
        let result = constraints().page(7, 0).unwrap().apply(items(10));
        assert_eq!(result.len(), 10);
        assert_eq!(result.total_pages(), 1);
    }

    #[test]
    fn test_clear_sorting_restores_natural_order() {
        let unsorted = constraints().apply(items(10));
        let cleared = constraints()
            .sort_by_descending("id")
            .unwrap()
            .clear_sorting()
            .apply(items(10));
        let a: Vec<i64> = unsorted.items().iter().map(|i| i.id).collect();
        let b: Vec<i64> = cleared.items().iter().map(|i| i.id).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_sort_values_order_first() {
        let mut rows = items(3);
        rows[1].grade = None;
        let result = constraints().sort_by("grade").unwrap().apply(rows);
        assert_eq!(result.items()[0].id, 2);
    }
}
