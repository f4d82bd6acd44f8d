//! The storage-agnostic repository contract.
//!
//! Every backend (in-memory, PostgreSQL, blob, REST) implements
//! [`Repository`] for any entity type implementing [`Record`]. Callers write
//! against the trait; the backend decides which constraint features it can
//! honor and advertises them through [`Capabilities`]. A `find` that asks for
//! a feature the backend lacks fails with [`RepoError::Unsupported`] instead
//! of silently ignoring the request.

use crate::constraints::{ConstraintError, QueryConstraints, QueryResult};
use crate::params::{ParamError, ParamSet};
use crate::record::Record;
use crate::schema::SchemaError;
use crate::value::Value;
use std::fmt;

/// A free-form filter with named parameters.
///
/// The text is backend-specific: a SQL fragment for the `WHERE` clause on the
/// SQL backend, a path/query template on the REST backend. Placeholders are
/// validated against `params` before anything executes.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    text: String,
    params: ParamSet,
}

impl Filter {
    pub fn new(text: impl Into<String>) -> Self {
        Filter {
            text: text.into(),
            params: ParamSet::new(),
        }
    }

    /// Attach a named parameter value.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params = self.params.set(name, value);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }
}

/// Which constraint features a backend honors.
///
/// `find` checks the requested constraints against these flags first and
/// fails with [`RepoError::Unsupported`] naming the feature.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub sorting: bool,
    pub paging: bool,
    pub includes: bool,
    pub filters: bool,
}

impl Capabilities {
    /// Everything on.
    pub const fn full() -> Self {
        Capabilities {
            sorting: true,
            paging: true,
            includes: true,
            filters: true,
        }
    }

    /// Verify the requested constraints (and filter presence) against these
    /// capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Unsupported`] naming the first feature the
    /// backend does not honor.
    pub fn check(
        &self,
        filter: Option<&Filter>,
        constraints: &QueryConstraints,
    ) -> Result<(), RepoError> {
        if filter.is_some() && !self.filters {
            return Err(RepoError::unsupported("filters"));
        }
        if constraints.sort_property().is_some() && !self.sorting {
            return Err(RepoError::unsupported("sorting"));
        }
        if constraints.page_size() > 0 && !self.paging {
            return Err(RepoError::unsupported("paging"));
        }
        if !constraints.includes().is_empty() && !self.includes {
            return Err(RepoError::unsupported("includes"));
        }
        Ok(())
    }
}

/// Umbrella error for repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Schema or property-path resolution failed.
    Schema(SchemaError),
    /// Constraint construction or entity mismatch.
    Constraint(ConstraintError),
    /// Filter placeholder validation failed.
    Param(ParamError),
    /// The backend does not honor a requested constraint feature.
    Unsupported { feature: String },
    /// Update/delete targeted an id that does not exist.
    NotFound { entity: String, id: String },
    /// PostgreSQL driver error.
    Postgres(may_postgres::Error),
    /// Remote API returned a non-success status.
    Api(ApiError),
    /// HTTP transport failure (connect, TLS, timeout).
    Http(Box<ureq::Transport>),
    /// Blob store or other I/O failure.
    Io(std::io::Error),
    /// Entity (de)serialization failed.
    Serde(serde_json::Error),
}

impl RepoError {
    pub(crate) fn unsupported(feature: &str) -> Self {
        RepoError::Unsupported {
            feature: feature.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &str, id: &Value) -> Self {
        RepoError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::Schema(e) => write!(f, "schema error: {e}"),
            RepoError::Constraint(e) => write!(f, "constraint error: {e}"),
            RepoError::Param(e) => write!(f, "parameter error: {e}"),
            RepoError::Unsupported { feature } => {
                write!(f, "this repository does not support {feature}")
            }
            RepoError::NotFound { entity, id } => {
                write!(f, "no '{entity}' with id {id}")
            }
            RepoError::Postgres(e) => write!(f, "postgres error: {e}"),
            RepoError::Api(e) => write!(f, "{e}"),
            RepoError::Http(e) => write!(f, "http transport error: {e}"),
            RepoError::Io(e) => write!(f, "io error: {e}"),
            RepoError::Serde(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl std::error::Error for RepoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RepoError::Schema(e) => Some(e),
            RepoError::Constraint(e) => Some(e),
            RepoError::Param(e) => Some(e),
            RepoError::Postgres(e) => Some(e),
            RepoError::Api(e) => Some(e),
            RepoError::Http(e) => Some(e.as_ref()),
            RepoError::Io(e) => Some(e),
            RepoError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchemaError> for RepoError {
    fn from(e: SchemaError) -> Self {
        RepoError::Schema(e)
    }
}

impl From<ConstraintError> for RepoError {
    fn from(e: ConstraintError) -> Self {
        RepoError::Constraint(e)
    }
}

impl From<ParamError> for RepoError {
    fn from(e: ParamError) -> Self {
        RepoError::Param(e)
    }
}

impl From<may_postgres::Error> for RepoError {
    fn from(e: may_postgres::Error) -> Self {
        RepoError::Postgres(e)
    }
}

impl From<ApiError> for RepoError {
    fn from(e: ApiError) -> Self {
        RepoError::Api(e)
    }
}

impl From<std::io::Error> for RepoError {
    fn from(e: std::io::Error) -> Self {
        RepoError::Io(e)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serde(e)
    }
}

/// A failed call against a remote HTTP API.
#[derive(Debug)]
pub struct ApiError {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub body: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} failed with status {}: {}",
            self.method, self.path, self.status, self.body
        )
    }
}

impl std::error::Error for ApiError {}

/// CRUD plus constrained queries over one entity type.
///
/// Constraints are built independently with
/// [`QueryConstraints::for_entity`] and passed per call; a repository holds
/// no query state and is safe to share between callers with different query
/// intents.
pub trait Repository<T: Record> {
    /// The constraint features this backend honors.
    fn capabilities(&self) -> Capabilities;

    /// Persist a new entity. Returns the stored entity (backends that
    /// generate values on write return the stored form).
    fn create(&self, entity: T) -> Result<T, RepoError>;

    /// Persist a batch. Equivalent to repeated [`Repository::create`]; the
    /// SQL backend batches into one statement.
    fn create_many(&self, entities: Vec<T>) -> Result<Vec<T>, RepoError>;

    /// Replace the stored entity with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] when no entity with that id exists.
    fn update(&self, entity: T) -> Result<T, RepoError>;

    /// Delete by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] when no entity with that id exists.
    fn delete(&self, id: &Value) -> Result<(), RepoError>;

    /// Delete a batch of ids. Ids that do not exist are skipped; returns the
    /// number actually deleted.
    fn delete_many(&self, ids: &[Value]) -> Result<usize, RepoError>;

    /// Fetch one entity by id, `None` when absent.
    fn get_by_id(&self, id: &Value) -> Result<Option<T>, RepoError>;

    /// Run a constrained query: optional filter, then sorting, then paging,
    /// with includes applied at materialization.
    ///
    /// `result.total_count()` always reflects the unpaged matching set.
    fn find(
        &self,
        filter: Option<&Filter>,
        constraints: &QueryConstraints,
    ) -> Result<QueryResult<T>, RepoError>;

    /// Convenience: `find` with no filter.
    fn find_all(&self, constraints: &QueryConstraints) -> Result<QueryResult<T>, RepoError> {
        self.find(None, constraints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::catalog_schema;
    use std::sync::Arc;

    fn constraints() -> QueryConstraints {
        QueryConstraints::for_entity(Arc::new(catalog_schema()), "product").unwrap()
    }

    #[test]
    fn test_capability_check_names_the_feature() {
        let caps = Capabilities {
            sorting: false,
            paging: true,
            includes: true,
            filters: true,
        };
        let err = caps
            .check(None, &constraints().sort_by("name").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("sorting"));
    }

    #[test]
    fn test_capability_check_rejects_filter() {
        let caps = Capabilities {
            sorting: true,
            paging: true,
            includes: true,
            filters: false,
        };
        let filter = Filter::new("name = @name").param("name", "x");
        let err = caps.check(Some(&filter), &constraints()).unwrap_err();
        assert!(matches!(err, RepoError::Unsupported { feature } if feature == "filters"));
    }

    #[test]
    fn test_full_capabilities_accept_everything() {
        let caps = Capabilities::full();
        let filter = Filter::new("id > @id").param("id", 0i64);
        let c = constraints()
            .sort_by("name")
            .unwrap()
            .page(1, 10)
            .unwrap()
            .include("parts")
            .unwrap();
        assert!(caps.check(Some(&filter), &c).is_ok());
    }

    #[test]
    fn test_unpaged_constraints_do_not_require_paging() {
        let caps = Capabilities {
            sorting: false,
            paging: false,
            includes: false,
            filters: false,
        };
        assert!(caps.check(None, &constraints()).is_ok());
    }
}
