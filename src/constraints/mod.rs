//! The query-constraint composition engine.
//!
//! [`QueryConstraints`] is the one cross-backend contract in this crate: an
//! immutable-after-build specification of paging, sorting and inclusion that
//! callers construct fluently and pass to `find`. The original design hung
//! these settings off the repository instance itself, which made a repository
//! unsafe to share between callers with different query intents; building the
//! constraints independently and passing them as a parameter removes that
//! hazard outright.
//!
//! Validation happens at the fluent call, not at `find` time: `sort_by` and
//! `include` reject unknown properties immediately with a [`SchemaError`],
//! `page` rejects an out-of-range page number with a [`ConstraintError`].
//!
//! # Example
//!
//! ```
//! use depot::constraints::QueryConstraints;
//! use depot::schema::{Schema, ScalarType};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(
//!     Schema::builder()
//!         .entity("product", "products", |e| {
//!             e.scalar("id", ScalarType::Int64)
//!                 .scalar("name", ScalarType::Text)
//!         })
//!         .build()
//!         .unwrap(),
//! );
//!
//! let constraints = QueryConstraints::for_entity(schema, "product")
//!     .unwrap()
//!     .sort_by("Name")
//!     .unwrap()
//!     .page(2, 40)
//!     .unwrap();
//!
//! assert_eq!(constraints.sort_property(), Some("name"));
//! assert_eq!(constraints.page_number(), 2);
//! ```

mod apply;
mod result;

pub use result::QueryResult;

use crate::schema::{Schema, SchemaError};
use std::fmt;
use std::sync::Arc;

/// Lowest accepted page number (pages are 1-based).
pub const MIN_PAGE_NUMBER: u32 = 1;
/// Highest accepted page number.
pub const MAX_PAGE_NUMBER: u32 = 1000;

/// Sort direction. `Unspecified` means no sorting is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Unspecified,
    Ascending,
    Descending,
}

/// Constraint-level errors (paging range, entity mismatch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// Page number outside `[MIN_PAGE_NUMBER, MAX_PAGE_NUMBER]`.
    PageNumberOutOfRange { value: u32 },
    /// Constraints built for one entity were passed to a repository of
    /// another.
    EntityMismatch { expected: String, actual: String },
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintError::PageNumberOutOfRange { value } => write!(
                f,
                "page number {value} is outside [{MIN_PAGE_NUMBER}, {MAX_PAGE_NUMBER}]"
            ),
            ConstraintError::EntityMismatch { expected, actual } => write!(
                f,
                "constraints built for entity '{actual}' passed to a '{expected}' repository"
            ),
        }
    }
}

impl std::error::Error for ConstraintError {}

/// Paging, sorting and inclusion to apply to one `find` call.
///
/// Invariants held by construction:
/// - `sort_property` is `Some` exactly when `sort_order != Unspecified`
///   (`sort_by*` sets both, `clear_sorting` clears both);
/// - `page_number` is within `[1, 1000]`; `page_size == 0` means no paging
///   (the documented "unlimited" sentinel, and the default);
/// - every entry in `includes` resolved against the entity graph when it was
///   added, stored in canonical casing, duplicates suppressed.
#[derive(Debug, Clone)]
pub struct QueryConstraints {
    schema: Arc<Schema>,
    entity: String,
    sort_property: Option<String>,
    sort_order: SortOrder,
    page_number: u32,
    page_size: u32,
    includes: Vec<String>,
}

impl QueryConstraints {
    /// Start constraints for an entity. Defaults: no sorting, no paging
    /// (`page_number = 1`, `page_size = 0`), no includes.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownEntity`] when the entity is not declared
    /// in the schema.
    pub fn for_entity(schema: Arc<Schema>, entity: &str) -> Result<Self, SchemaError> {
        let canonical = schema.entity(entity)?.name().to_string();
        Ok(QueryConstraints {
            schema,
            entity: canonical,
            sort_property: None,
            sort_order: SortOrder::Unspecified,
            page_number: MIN_PAGE_NUMBER,
            page_size: 0,
            includes: Vec::new(),
        })
    }

    /// Sort ascending by a property name (any casing).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownProperty`] immediately when the property
    /// does not exist on the entity.
    pub fn sort_by(mut self, property: &str) -> Result<Self, SchemaError> {
        let canonical = self.schema.property_name(&self.entity, property)?;
        self.sort_property = Some(canonical);
        self.sort_order = SortOrder::Ascending;
        Ok(self)
    }

    /// Sort descending by a property name (any casing).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownProperty`] immediately when the property
    /// does not exist on the entity.
    pub fn sort_by_descending(mut self, property: &str) -> Result<Self, SchemaError> {
        let canonical = self.schema.property_name(&self.entity, property)?;
        self.sort_property = Some(canonical);
        self.sort_order = SortOrder::Descending;
        Ok(self)
    }

    /// Remove any sorting. `find` afterwards yields the backend's natural
    /// order, identical to never having sorted.
    pub fn clear_sorting(mut self) -> Self {
        self.sort_property = None;
        self.sort_order = SortOrder::Unspecified;
        self
    }

    /// Request a page. `number` is 1-based; `size == 0` disables paging.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError::PageNumberOutOfRange`] when `number` is
    /// outside `[1, 1000]`; out-of-range input is rejected, never clamped.
    pub fn page(mut self, number: u32, size: u32) -> Result<Self, ConstraintError> {
        if !(MIN_PAGE_NUMBER..=MAX_PAGE_NUMBER).contains(&number) {
            return Err(ConstraintError::PageNumberOutOfRange { value: number });
        }
        self.page_number = number;
        self.page_size = size;
        Ok(self)
    }

    /// Reset paging to the defaults (everything on one unlimited page).
    pub fn clear_paging(mut self) -> Self {
        self.page_number = MIN_PAGE_NUMBER;
        self.page_size = 0;
        self
    }

    /// Eager-load a navigation path (e.g. `"products.parts"`, any casing).
    /// Paths are validated on insert and stored canonically; adding the same
    /// path twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownProperty`] immediately when any segment
    /// fails to resolve.
    pub fn include(mut self, path: &str) -> Result<Self, SchemaError> {
        let canonical = self.schema.property_path(&self.entity, path)?;
        if !self.includes.contains(&canonical) {
            self.includes.push(canonical);
        }
        Ok(self)
    }

    /// Remove all include paths.
    pub fn clear_includes(mut self) -> Self {
        self.includes.clear();
        self
    }

    /// Entity these constraints were built for (canonical casing).
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The schema the constraints validate against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Canonical sort property, when sorting is active.
    pub fn sort_property(&self) -> Option<&str> {
        self.sort_property.as_deref()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// 1-based page number (always >= 1).
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Page size; 0 means unlimited.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Canonical include paths in insertion order.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Whether any constraint deviates from the defaults.
    pub fn is_default(&self) -> bool {
        self.sort_order == SortOrder::Unspecified
            && self.page_size == 0
            && self.page_number == MIN_PAGE_NUMBER
            && self.includes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::catalog_schema;

    fn constraints() -> QueryConstraints {
        QueryConstraints::for_entity(Arc::new(catalog_schema()), "category").unwrap()
    }

    #[test]
    fn test_defaults() {
        let c = constraints();
        assert_eq!(c.page_number(), 1);
        assert_eq!(c.page_size(), 0);
        assert_eq!(c.sort_order(), SortOrder::Unspecified);
        assert!(c.sort_property().is_none());
        assert!(c.includes().is_empty());
        assert!(c.is_default());
    }

    #[test]
    fn test_sort_property_and_order_set_together() {
        let c = constraints().sort_by("NAME").unwrap();
        assert_eq!(c.sort_property(), Some("name"));
        assert_eq!(c.sort_order(), SortOrder::Ascending);

        let c = c.clear_sorting();
        assert!(c.sort_property().is_none());
        assert_eq!(c.sort_order(), SortOrder::Unspecified);
    }

    #[test]
    fn test_sort_by_unknown_property_fails_at_call() {
        let err = constraints().sort_by("donald").unwrap_err();
        assert!(err.to_string().contains("donald"));
        assert!(err.to_string().contains("category"));
    }

    #[test]
    fn test_page_zero_rejected_not_clamped() {
        let err = constraints().page(0, 10).unwrap_err();
        assert!(matches!(
            err,
            ConstraintError::PageNumberOutOfRange { value: 0 }
        ));
    }

    #[test]
    fn test_page_upper_bound() {
        assert!(constraints().page(1000, 10).is_ok());
        assert!(constraints().page(1001, 10).is_err());
    }

    #[test]
    fn test_include_validates_and_deduplicates() {
        let c = constraints()
            .include("Products")
            .unwrap()
            .include("products.PARTS")
            .unwrap()
            .include("products")
            .unwrap();
        assert_eq!(c.includes(), ["products", "products.parts"]);
    }

    #[test]
    fn test_include_invalid_path_fails_at_call() {
        assert!(constraints().include("Donald.Duck").is_err());
    }

    #[test]
    fn test_entity_canonicalized() {
        let c = QueryConstraints::for_entity(Arc::new(catalog_schema()), "CATEGORY").unwrap();
        assert_eq!(c.entity(), "category");
    }
}
