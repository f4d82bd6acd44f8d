//! Storage-agnostic repositories with a shared query-constraint engine.
//!
//! `depot` separates *what to fetch* from *where it is stored*. Callers
//! build a [`QueryConstraints`] value (paging, sorting, eager-load
//! includes) validated against an explicit [`Schema`], and pass it to any
//! [`Repository`] backend:
//!
//! - [`MemoryRepository`]: `Mutex`-guarded vector, for tests and prototypes;
//! - [`PgRepository`]: PostgreSQL over `may_postgres`, with raw SQL filters
//!   and select-in eager loading;
//! - [`BlobRepository`]: JSON blobs in an object store (filesystem included);
//! - [`RestRepository`]: a remote HTTP resource.
//!
//! Backends advertise what they honor through [`Capabilities`]; asking for
//! an unsupported feature fails loudly instead of being ignored. Free-form
//! filters pass a placeholder-validation gate ([`params`]) before any query
//! executes.
//!
//! # Example
//!
//! ```
//! use depot::{MemoryRepository, QueryConstraints, Record, Repository, Value};
//! use depot::schema::{Schema, ScalarType};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Product {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Record for Product {
//!     fn get(&self, property: &str) -> Option<Value> {
//!         match property {
//!             "id" => Some(Value::Int(self.id)),
//!             "name" => Some(Value::Text(self.name.clone())),
//!             _ => None,
//!         }
//!     }
//! }
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
//! let repo = MemoryRepository::new(schema.clone(), "product").unwrap();
//! repo.create(Product { id: 1, name: "anvil".into() }).unwrap();
//!
//! let constraints = QueryConstraints::for_entity(schema, "product")
//!     .unwrap()
//!     .sort_by("name")
//!     .unwrap()
//!     .page(1, 20)
//!     .unwrap();
//! let result = repo.find_all(&constraints).unwrap();
//! assert_eq!(result.total_count(), 1);
//! ```

pub mod blob;
pub mod constraints;
pub mod memory;
pub mod params;
pub mod postgres;
pub mod record;
pub mod repository;
pub mod rest;
pub mod schema;
pub mod settings;
pub mod value;

pub use blob::{BlobRepository, BlobStore, FsBlobStore};
pub use constraints::{QueryConstraints, QueryResult, SortOrder};
pub use memory::MemoryRepository;
pub use params::{ParamSet, PlaceholderPattern};
pub use postgres::{connect, MayPostgresExecutor, PgExecutor, PgRepository};
pub use record::Record;
pub use repository::{ApiError, Capabilities, Filter, RepoError, Repository};
pub use rest::RestRepository;
pub use schema::{EntitySchema, PathCheck, PropertyKind, ScalarType, Schema, SchemaError};
pub use settings::Settings;
pub use value::Value;
