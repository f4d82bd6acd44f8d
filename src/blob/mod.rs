//! Object-store repository: entities as JSON blobs.
//!
//! Each entity serializes to one blob under `"{table}/{id}.json"`. The
//! backend follows native object-store semantics rather than relational
//! ones: create and update both overwrite, delete is idempotent, and a
//! missing get is `None`.
//!
//! The only query feature is prefix listing: a [`Filter`]'s text is taken
//! as a key prefix within the entity's key space. Sorting, paging and
//! includes report `Unsupported`.

pub mod fs;

pub use fs::FsBlobStore;

use crate::constraints::{ConstraintError, QueryConstraints, QueryResult};
use crate::record::Record;
use crate::repository::{Capabilities, Filter, RepoError, Repository};
use crate::schema::Schema;
use crate::value::Value;
use std::io;
use std::marker::PhantomData;
use std::sync::Arc;

/// Minimal key/value blob storage.
///
/// Keys are `/`-separated relative paths. Implementations must treat `put`
/// as overwrite and `delete` of a missing key as a no-op (returning `false`).
pub trait BlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()>;
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> io::Result<bool>;
    /// All keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> io::Result<Vec<String>>;
}

pub struct BlobRepository<T> {
    schema: Arc<Schema>,
    entity: String,
    store: Box<dyn BlobStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> BlobRepository<T> {
    /// Create a repository for one entity over a blob store.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Schema`] when the entity is not declared.
    pub fn new(
        schema: Arc<Schema>,
        entity: &str,
        store: impl BlobStore + 'static,
    ) -> Result<Self, RepoError> {
        let canonical = schema.entity(entity)?.name().to_string();
        Ok(BlobRepository {
            schema,
            entity: canonical,
            store: Box::new(store),
            _marker: PhantomData,
        })
    }

    fn key_space(&self) -> Result<String, RepoError> {
        Ok(format!("{}/", self.schema.entity(&self.entity)?.table()))
    }

    fn key_for(&self, id: &Value) -> Result<String, RepoError> {
        Ok(format!("{}{id}.json", self.key_space()?))
    }

    fn id_of(&self, entity: &T) -> Result<Value, RepoError> {
        let id_property = self.schema.entity(&self.entity)?.id_property()?;
        Ok(entity.get(id_property).unwrap_or(Value::Null))
    }

    fn write(&self, entity: &T) -> Result<(), RepoError> {
        let key = self.key_for(&self.id_of(entity)?)?;
        let bytes = serde_json::to_vec(entity)?;
        self.store.put(&key, &bytes)?;
        Ok(())
    }
}

impl<T: Record> Repository<T> for BlobRepository<T> {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            sorting: false,
            paging: false,
            includes: false,
            filters: true,
        }
    }

    /// Overwrites any existing blob under the same id.
    fn create(&self, entity: T) -> Result<T, RepoError> {
        self.write(&entity)?;
        Ok(entity)
    }

    fn create_many(&self, entities: Vec<T>) -> Result<Vec<T>, RepoError> {
        for entity in &entities {
            self.write(entity)?;
        }
        Ok(entities)
    }

    /// Same as [`BlobRepository::create`]: object stores have no
    /// compare-and-set, so update never reports `NotFound`.
    fn update(&self, entity: T) -> Result<T, RepoError> {
        self.write(&entity)?;
        Ok(entity)
    }

    /// Idempotent: deleting a missing id is not an error.
    fn delete(&self, id: &Value) -> Result<(), RepoError> {
        self.store.delete(&self.key_for(id)?)?;
        Ok(())
    }

    fn delete_many(&self, ids: &[Value]) -> Result<usize, RepoError> {
        let mut deleted = 0;
        for id in ids {
            if self.store.delete(&self.key_for(id)?)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn get_by_id(&self, id: &Value) -> Result<Option<T>, RepoError> {
        match self.store.get(&self.key_for(id)?)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Prefix listing: the filter text narrows the key prefix within this
    /// entity's key space; its parameters are unused.
    fn find(
        &self,
        filter: Option<&Filter>,
        constraints: &QueryConstraints,
    ) -> Result<QueryResult<T>, RepoError> {
        self.capabilities().check(filter, constraints)?;
        if !constraints.entity().eq_ignore_ascii_case(&self.entity) {
            return Err(ConstraintError::EntityMismatch {
                expected: self.entity.clone(),
                actual: constraints.entity().to_string(),
            }
            .into());
        }
        let prefix = match filter {
            Some(f) => format!("{}{}", self.key_space()?, f.text()),
            None => self.key_space()?,
        };
        let keys = self.store.list(&prefix)?;
        log::debug!("blob find under '{prefix}': {} keys", keys.len());
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.store.get(&key)? {
                items.push(serde_json::from_slice(&bytes)?);
            }
        }
        let total = items.len();
        Ok(QueryResult::new(items, total, 1, 0))
    }
}
