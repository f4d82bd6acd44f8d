//! The typed field-accessor trait every persisted entity implements.
//!
//! In place of reflection, each entity exposes its properties by canonical
//! name through [`Record::get`]. Property names here must match the names
//! declared in the entity's [`crate::schema::EntitySchema`] *and* the serde
//! field names, since backends materialize entities through `serde` and
//! project sort keys through `get`.
//!
//! # Example
//!
//! ```
//! use depot::{Record, Value};
//! use serde::{Deserialize, Serialize};
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
//! ```

use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A plain data record persisted through a repository.
///
/// `Serialize`/`DeserializeOwned` cover materialization (SQL row → JSON →
/// entity, blob payloads, REST bodies); `get` covers dynamic projection
/// (sorting, id extraction). Unknown property names return `None`; absent
/// optional values return `Some(Value::Null)`.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Project a property by its canonical schema name.
    fn get(&self, property: &str) -> Option<Value>;
}
