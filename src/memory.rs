//! In-memory repository, primarily for tests and prototyping.
//!
//! Stores whole entity aggregates behind a `Mutex`. Sorting and paging run
//! through [`QueryConstraints::apply`]; includes are honored by *pruning*:
//! the stored aggregate is serialized, every navigation property not named by
//! an include path is nulled out, and the result is deserialized back. A
//! caller that omits an include therefore observes the same shape it would
//! get from the SQL backend (`None`/empty navigations), which keeps tests
//! honest about what they asked to load.
//!
//! Free-form filters are not supported, since there is no query language
//! to interpret them against, so [`Capabilities::filters`] is off.

use crate::constraints::{ConstraintError, QueryConstraints, QueryResult};
use crate::record::Record;
use crate::repository::{Capabilities, Filter, RepoError, Repository};
use crate::schema::{EntitySchema, PropertyKind, Schema};
use crate::value::Value;
use std::sync::{Arc, Mutex};

pub struct MemoryRepository<T> {
    schema: Arc<Schema>,
    entity: String,
    items: Mutex<Vec<T>>,
}

impl<T: Record> MemoryRepository<T> {
    /// Create an empty repository for one entity type.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Schema`] when the entity is not declared.
    pub fn new(schema: Arc<Schema>, entity: &str) -> Result<Self, RepoError> {
        let canonical = schema.entity(entity)?.name().to_string();
        Ok(MemoryRepository {
            schema,
            entity: canonical,
            items: Mutex::new(Vec::new()),
        })
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn id_of(&self, entity: &T) -> Result<Value, RepoError> {
        let id_property = self.schema.entity(&self.entity)?.id_property()?;
        Ok(entity.get(id_property).unwrap_or(Value::Null))
    }

    fn check_entity(&self, constraints: &QueryConstraints) -> Result<(), RepoError> {
        if !constraints.entity().eq_ignore_ascii_case(&self.entity) {
            return Err(ConstraintError::EntityMismatch {
                expected: self.entity.clone(),
                actual: constraints.entity().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Re-materialize `item` with every navigation not named in `includes`
    /// nulled out.
    fn apply_includes(&self, item: &T, includes: &[String]) -> Result<T, RepoError> {
        let mut json = serde_json::to_value(item)?;
        let entity = self.schema.entity(&self.entity)?;
        prune_navigations(&self.schema, entity, includes, &mut json);
        Ok(serde_json::from_value(json)?)
    }
}

/// Null out navigation properties of `json` that `includes` does not name,
/// recursing into included ones with the matching sub-paths.
fn prune_navigations(
    schema: &Schema,
    entity: &EntitySchema,
    includes: &[String],
    json: &mut serde_json::Value,
) {
    let serde_json::Value::Object(map) = json else {
        return;
    };
    for property in entity.navigations() {
        let name = property.name();
        let target = match property.kind() {
            PropertyKind::Collection { entity, .. } | PropertyKind::Reference { entity, .. } => {
                entity
            }
            PropertyKind::Scalar(_) => continue,
        };
        let included = includes
            .iter()
            .any(|path| path == name || path.starts_with(&format!("{name}.")));
        let Some(slot) = map.get_mut(name) else {
            continue;
        };
        if !included {
            *slot = serde_json::Value::Null;
            continue;
        }
        let sub_includes: Vec<String> = includes
            .iter()
            .filter_map(|path| path.strip_prefix(&format!("{name}.")))
            .map(str::to_string)
            .collect();
        let Ok(child) = schema.entity(target) else {
            continue;
        };
        match slot {
            serde_json::Value::Array(elements) => {
                for element in elements {
                    prune_navigations(schema, child, &sub_includes, element);
                }
            }
            other => prune_navigations(schema, child, &sub_includes, other),
        }
    }
}

impl<T: Record> Repository<T> for MemoryRepository<T> {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            sorting: true,
            paging: true,
            includes: true,
            filters: false,
        }
    }

    fn create(&self, entity: T) -> Result<T, RepoError> {
        self.items.lock().unwrap().push(entity.clone());
        Ok(entity)
    }

    fn create_many(&self, entities: Vec<T>) -> Result<Vec<T>, RepoError> {
        self.items.lock().unwrap().extend(entities.iter().cloned());
        Ok(entities)
    }

    fn update(&self, entity: T) -> Result<T, RepoError> {
        let id = self.id_of(&entity)?;
        let mut items = self.items.lock().unwrap();
        for stored in items.iter_mut() {
            if self.id_of(stored)? == id {
                *stored = entity.clone();
                return Ok(entity);
            }
        }
        Err(RepoError::not_found(&self.entity, &id))
    }

    fn delete(&self, id: &Value) -> Result<(), RepoError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        let mut result = Ok(());
        items.retain(|stored| match self.id_of(stored) {
            Ok(stored_id) => stored_id != *id,
            Err(e) => {
                result = Err(e);
                true
            }
        });
        result?;
        if items.len() == before {
            return Err(RepoError::not_found(&self.entity, id));
        }
        Ok(())
    }

    fn delete_many(&self, ids: &[Value]) -> Result<usize, RepoError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        let mut result = Ok(());
        items.retain(|stored| match self.id_of(stored) {
            Ok(stored_id) => !ids.contains(&stored_id),
            Err(e) => {
                result = Err(e);
                true
            }
        });
        result?;
        Ok(before - items.len())
    }

    fn get_by_id(&self, id: &Value) -> Result<Option<T>, RepoError> {
        let items = self.items.lock().unwrap();
        for stored in items.iter() {
            if self.id_of(stored)? == *id {
                return Ok(Some(stored.clone()));
            }
        }
        Ok(None)
    }

    fn find(
        &self,
        filter: Option<&Filter>,
        constraints: &QueryConstraints,
    ) -> Result<QueryResult<T>, RepoError> {
        self.capabilities().check(filter, constraints)?;
        self.check_entity(constraints)?;

        let snapshot: Vec<T> = self.items.lock().unwrap().clone();
        log::debug!(
            "memory find on '{}': {} stored, constraints default = {}",
            self.entity,
            snapshot.len(),
            constraints.is_default()
        );

        let result = constraints.apply(snapshot);
        let total = result.total_count();
        let page_number = result.page_number();
        let page_size = result.page_size();
        let items = result.into_items();

        // Prune only the returned page
        let mut materialized = Vec::with_capacity(items.len());
        for item in items {
            materialized.push(self.apply_includes(&item, constraints.includes())?);
        }
        Ok(QueryResult::new(
            materialized,
            total,
            page_number,
            page_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::catalog_schema;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Part {
        id: i64,
        product_id: i64,
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: i64,
        category_id: i64,
        name: String,
        maker_id: i64,
        #[serde(default)]
        parts: Option<Vec<Part>>,
        #[serde(default)]
        maker: Option<Box<serde_json::Value>>,
    }

    impl Record for Product {
        fn get(&self, property: &str) -> Option<Value> {
            match property {
                "id" => Some(Value::Int(self.id)),
                "category_id" => Some(Value::Int(self.category_id)),
                "name" => Some(Value::Text(self.name.clone())),
                "maker_id" => Some(Value::Int(self.maker_id)),
                _ => None,
            }
        }
    }

    fn repo() -> MemoryRepository<Product> {
        MemoryRepository::new(Arc::new(catalog_schema()), "product").unwrap()
    }

    fn product(id: i64) -> Product {
        Product {
            id,
            category_id: 1,
            name: format!("product {id:03}"),
            maker_id: 1,
            parts: Some(vec![Part {
                id: id * 10,
                product_id: id,
                name: format!("part of {id}"),
            }]),
            maker: None,
        }
    }

    fn constraints() -> QueryConstraints {
        QueryConstraints::for_entity(Arc::new(catalog_schema()), "product").unwrap()
    }

    #[test]
    fn test_create_and_get_by_id() {
        let repo = repo();
        repo.create(product(1)).unwrap();
        let found = repo.get_by_id(&Value::Int(1)).unwrap().unwrap();
        assert_eq!(found.id, 1);
        assert!(repo.get_by_id(&Value::Int(99)).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let err = repo().update(product(1)).unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
    }

    #[test]
    fn test_delete_and_delete_many() {
        let repo = repo();
        repo.create_many((1..=5).map(product).collect()).unwrap();
        repo.delete(&Value::Int(3)).unwrap();
        assert_eq!(repo.len(), 4);
        assert!(matches!(
            repo.delete(&Value::Int(3)),
            Err(RepoError::NotFound { .. })
        ));
        // absent ids in the batch are skipped, not errors
        let deleted = repo
            .delete_many(&[Value::Int(1), Value::Int(2), Value::Int(3)])
            .unwrap();
        assert_eq!(deleted, 2);
    }

    #[test]
    fn test_find_pages_after_sorting() {
        let repo = repo();
        repo.create_many((1..=100).map(product).collect()).unwrap();
        let result = repo
            .find_all(&constraints().sort_by("name").unwrap().page(2, 40).unwrap())
            .unwrap();
        assert_eq!(result.len(), 40);
        assert_eq!(result.total_count(), 100);
        assert_eq!(result.start_index(), 41);
        // names are zero-padded so lexicographic == numeric
        assert_eq!(result.items()[0].name, "product 041");
        assert_eq!(result.items()[39].name, "product 080");
    }

    #[test]
    fn test_find_past_the_end_is_empty_with_total() {
        let repo = repo();
        repo.create_many((1..=100).map(product).collect()).unwrap();
        let result = repo.find_all(&constraints().page(4, 40).unwrap()).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total_count(), 100);
    }

    #[test]
    fn test_omitted_include_prunes_navigation() {
        let repo = repo();
        repo.create(product(1)).unwrap();
        let bare = repo.find_all(&constraints()).unwrap();
        assert!(bare.items()[0].parts.is_none());

        let loaded = repo
            .find_all(&constraints().include("parts").unwrap())
            .unwrap();
        let parts = loaded.items()[0].parts.as_ref().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].product_id, 1);
    }

    #[test]
    fn test_filter_is_unsupported() {
        let repo = repo();
        let filter = Filter::new("name = @name").param("name", "x");
        let err = repo.find(Some(&filter), &constraints()).unwrap_err();
        assert!(matches!(err, RepoError::Unsupported { feature } if feature == "filters"));
    }

    #[test]
    fn test_entity_mismatch_rejected() {
        let repo = repo();
        let other = QueryConstraints::for_entity(Arc::new(catalog_schema()), "category").unwrap();
        let err = repo.find_all(&other).unwrap_err();
        assert!(matches!(
            err,
            RepoError::Constraint(ConstraintError::EntityMismatch { .. })
        ));
    }
}
