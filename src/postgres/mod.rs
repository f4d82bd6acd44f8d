//! PostgreSQL repository over `may_postgres`.
//!
//! The only backend with full [`Capabilities`]: free-form SQL filters with
//! `@name` placeholders, sorting and paging pushed into the statement, and
//! includes loaded with the select-in strategy (one extra query per included
//! navigation, never one per row).
//!
//! Rows materialize through JSON: each row decodes into a JSON object keyed
//! by canonical property names, navigations are attached to those objects,
//! and the finished object deserializes into the entity type. When paging is
//! on, a separate `COUNT(*)` sharing the find's filter produces the unpaged
//! total.

pub mod executor;
mod sql;

pub use executor::{MayPostgresExecutor, PgExecutor};

use crate::constraints::{ConstraintError, QueryConstraints, QueryResult};
use crate::params::PlaceholderPattern;
use crate::record::Record;
use crate::repository::{Capabilities, Filter, RepoError, Repository};
use crate::schema::{EntitySchema, PropertyKind, Schema};
use crate::value::Value;
use may_postgres::types::ToSql;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Connect to PostgreSQL and wrap the client in the default executor.
///
/// # Errors
///
/// Returns [`RepoError::Postgres`] when the connection fails.
pub fn connect(url: &str) -> Result<MayPostgresExecutor, RepoError> {
    let client = may_postgres::connect(url)?;
    Ok(MayPostgresExecutor::new(client))
}

pub struct PgRepository<T> {
    schema: Arc<Schema>,
    entity: String,
    executor: Box<dyn PgExecutor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> PgRepository<T> {
    /// Create a repository for one entity over an executor.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Schema`] when the entity is not declared.
    pub fn new(
        schema: Arc<Schema>,
        entity: &str,
        executor: impl PgExecutor + 'static,
    ) -> Result<Self, RepoError> {
        let canonical = schema.entity(entity)?.name().to_string();
        Ok(PgRepository {
            schema,
            entity: canonical,
            executor: Box::new(executor),
            _marker: PhantomData,
        })
    }

    fn entity_schema(&self) -> Result<&EntitySchema, RepoError> {
        Ok(self.schema.entity(&self.entity)?)
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

    fn column_values(&self, entity: &T) -> Result<Vec<Value>, RepoError> {
        let schema = self.entity_schema()?;
        Ok(schema
            .columns()
            .map(|c| entity.get(c.name()).unwrap_or(Value::Null))
            .collect())
    }

    /// Attach included navigations to materialized rows, level by level.
    ///
    /// Collections group a single child query's rows by foreign key;
    /// references map one target query's rows by id. Either way the id lists
    /// come from prior query output and render as literals.
    fn load_navigations(
        &self,
        entity: &EntitySchema,
        rows: &mut [serde_json::Value],
        includes: &[String],
    ) -> Result<(), RepoError> {
        if rows.is_empty() || includes.is_empty() {
            return Ok(());
        }
        let navigations: Vec<_> = entity.navigations().cloned().collect();
        for property in &navigations {
            let nav = property.name();
            if !includes
                .iter()
                .any(|path| path == nav || path.starts_with(&format!("{nav}.")))
            {
                continue;
            }
            let sub_includes: Vec<String> = includes
                .iter()
                .filter_map(|path| path.strip_prefix(&format!("{nav}.")))
                .map(str::to_string)
                .collect();
            match property.kind() {
                PropertyKind::Collection {
                    entity: target,
                    foreign_key,
                } => {
                    let id_property = entity.id_property()?;
                    self.attach_collection(
                        rows,
                        nav,
                        id_property,
                        target,
                        foreign_key,
                        &sub_includes,
                    )?;
                }
                PropertyKind::Reference {
                    entity: target,
                    foreign_key,
                } => {
                    self.attach_reference(rows, nav, target, foreign_key, &sub_includes)?;
                }
                PropertyKind::Scalar(_) => {}
            }
        }
        Ok(())
    }

    fn attach_collection(
        &self,
        rows: &mut [serde_json::Value],
        nav: &str,
        id_property: &str,
        target: &str,
        foreign_key: &str,
        sub_includes: &[String],
    ) -> Result<(), RepoError> {
        let child_schema = self.schema.entity(target)?.clone();
        let ids = distinct_values(rows, id_property);
        if ids.is_empty() {
            for row in rows.iter_mut() {
                set_field(row, nav, serde_json::Value::Array(Vec::new()));
            }
            return Ok(());
        }
        let select = sql::build_children_select(&child_schema, foreign_key, &ids);
        let child_rows = self.executor.query_all(&select, &[])?;
        let mut children: Vec<serde_json::Value> = child_rows
            .iter()
            .map(|r| sql::row_to_json(&child_schema, r))
            .collect::<Result<_, _>>()?;
        self.load_navigations(&child_schema, &mut children, sub_includes)?;

        let mut by_parent: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
        for child in children {
            let key = field_key(&child, foreign_key);
            by_parent.entry(key).or_default().push(child);
        }
        for row in rows.iter_mut() {
            let key = field_key(row, id_property);
            let group = by_parent.remove(&key).unwrap_or_default();
            set_field(row, nav, serde_json::Value::Array(group));
        }
        Ok(())
    }

    fn attach_reference(
        &self,
        rows: &mut [serde_json::Value],
        nav: &str,
        target: &str,
        foreign_key: &str,
        sub_includes: &[String],
    ) -> Result<(), RepoError> {
        let target_schema = self.schema.entity(target)?.clone();
        let target_id = target_schema.id_property()?.to_string();
        let ids = distinct_values(rows, foreign_key);
        if ids.is_empty() {
            return Ok(());
        }
        let select = sql::build_children_select(&target_schema, &target_id, &ids);
        let target_rows = self.executor.query_all(&select, &[])?;
        let mut targets: Vec<serde_json::Value> = target_rows
            .iter()
            .map(|r| sql::row_to_json(&target_schema, r))
            .collect::<Result<_, _>>()?;
        self.load_navigations(&target_schema, &mut targets, sub_includes)?;

        let by_id: HashMap<String, serde_json::Value> = targets
            .into_iter()
            .map(|t| (field_key(&t, &target_id), t))
            .collect();
        for row in rows.iter_mut() {
            let key = field_key(row, foreign_key);
            let found = by_id.get(&key).cloned().unwrap_or(serde_json::Value::Null);
            set_field(row, nav, found);
        }
        Ok(())
    }
}

/// Distinct non-null values of one field across rows, in first-seen order.
fn distinct_values(rows: &[serde_json::Value], field: &str) -> Vec<Value> {
    let mut seen: Vec<String> = Vec::new();
    let mut values = Vec::new();
    for row in rows {
        let Some(json) = row.get(field) else { continue };
        if json.is_null() {
            continue;
        }
        let value = Value::from_json(json);
        let key = value.to_sql_literal();
        if !seen.contains(&key) {
            seen.push(key);
            values.push(value);
        }
    }
    values
}

/// Stable grouping key for one field of a decoded row.
fn field_key(row: &serde_json::Value, field: &str) -> String {
    row.get(field)
        .map(Value::from_json)
        .unwrap_or(Value::Null)
        .to_sql_literal()
}

fn set_field(row: &mut serde_json::Value, field: &str, value: serde_json::Value) {
    if let serde_json::Value::Object(map) = row {
        map.insert(field.to_string(), value);
    }
}

impl<T: Record> Repository<T> for PgRepository<T> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    fn create(&self, entity: T) -> Result<T, RepoError> {
        let schema = self.entity_schema()?.clone();
        let insert = sql::build_insert(&schema, 1);
        let values = self.column_values(&entity)?;
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        self.executor.execute(&insert, &params)?;
        Ok(entity)
    }

    fn create_many(&self, entities: Vec<T>) -> Result<Vec<T>, RepoError> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let schema = self.entity_schema()?.clone();
        let insert = sql::build_insert(&schema, entities.len());
        let mut values = Vec::new();
        for entity in &entities {
            values.extend(self.column_values(entity)?);
        }
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        self.executor.execute(&insert, &params)?;
        Ok(entities)
    }

    fn update(&self, entity: T) -> Result<T, RepoError> {
        let schema = self.entity_schema()?.clone();
        let id_property = schema.id_property()?.to_string();
        let id = entity.get(&id_property).unwrap_or(Value::Null);
        let update = sql::build_update(&schema, &id_property);

        let mut values: Vec<Value> = schema
            .columns()
            .filter(|c| !c.name().eq_ignore_ascii_case(&id_property))
            .map(|c| entity.get(c.name()).unwrap_or(Value::Null))
            .collect();
        values.push(id.clone());
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        let affected = self.executor.execute(&update, &params)?;
        if affected == 0 {
            return Err(RepoError::not_found(&self.entity, &id));
        }
        Ok(entity)
    }

    fn delete(&self, id: &Value) -> Result<(), RepoError> {
        let schema = self.entity_schema()?.clone();
        let id_property = schema.id_property()?;
        let delete = sql::build_delete(&schema, id_property, 1);
        let affected = self.executor.execute(&delete, &[id as &dyn ToSql])?;
        if affected == 0 {
            return Err(RepoError::not_found(&self.entity, id));
        }
        Ok(())
    }

    fn delete_many(&self, ids: &[Value]) -> Result<usize, RepoError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let schema = self.entity_schema()?.clone();
        let id_property = schema.id_property()?;
        let delete = sql::build_delete(&schema, id_property, ids.len());
        let params: Vec<&dyn ToSql> = ids.iter().map(|v| v as &dyn ToSql).collect();
        let affected = self.executor.execute(&delete, &params)?;
        Ok(affected as usize)
    }

    fn get_by_id(&self, id: &Value) -> Result<Option<T>, RepoError> {
        let schema = self.entity_schema()?.clone();
        let id_property = schema.id_property()?;
        let constraints = QueryConstraints::for_entity(self.schema.clone(), &self.entity)?;
        let clause = format!("\"{id_property}\" = $1");
        let select = sql::build_select(&schema, Some(&clause), &constraints);
        let rows = self.executor.query_all(&select, &[id as &dyn ToSql])?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let json = sql::row_to_json(&schema, row)?;
        Ok(Some(serde_json::from_value(json)?))
    }

    fn find(
        &self,
        filter: Option<&Filter>,
        constraints: &QueryConstraints,
    ) -> Result<QueryResult<T>, RepoError> {
        self.capabilities().check(filter, constraints)?;
        self.check_entity(constraints)?;
        let schema = self.entity_schema()?.clone();

        // Placeholder validation runs before any statement is sent.
        let bound = match filter {
            Some(f) => {
                let (clause, values) = PlaceholderPattern::sql().bind(f.text(), f.params())?;
                Some((clause, values.into_iter().cloned().collect::<Vec<Value>>()))
            }
            None => None,
        };
        let where_clause = bound.as_ref().map(|(clause, _)| clause.as_str());
        let params: Vec<&dyn ToSql> = bound
            .as_ref()
            .map(|(_, values)| values.iter().map(|v| v as &dyn ToSql).collect())
            .unwrap_or_default();

        let select = sql::build_select(&schema, where_clause, constraints);
        log::debug!("find on '{}': {select}", self.entity);
        let rows = self.executor.query_all(&select, &params)?;
        let mut items: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| sql::row_to_json(&schema, r))
            .collect::<Result<_, _>>()?;

        let total = if constraints.page_size() > 0 {
            let count = sql::build_count(&schema, where_clause);
            let row = self.executor.query_one(&count, &params)?;
            let n: i64 = row.try_get(0)?;
            n as usize
        } else {
            items.len()
        };

        self.load_navigations(&schema, &mut items, constraints.includes())?;

        let mut typed = Vec::with_capacity(items.len());
        for item in items {
            typed.push(serde_json::from_value(item)?);
        }
        Ok(QueryResult::new(
            typed,
            total,
            constraints.page_number(),
            constraints.page_size(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::catalog_schema;
    use may_postgres::{Error as PostgresError, Row};
    use serde::{Deserialize, Serialize};

    /// Executor that must never be reached; validation failures happen first.
    struct UnreachableExecutor;

    impl PgExecutor for UnreachableExecutor {
        fn execute(&self, query: &str, _: &[&dyn ToSql]) -> Result<u64, PostgresError> {
            panic!("statement executed: {query}");
        }
        fn query_one(&self, query: &str, _: &[&dyn ToSql]) -> Result<Row, PostgresError> {
            panic!("statement executed: {query}");
        }
        fn query_all(&self, query: &str, _: &[&dyn ToSql]) -> Result<Vec<Row>, PostgresError> {
            panic!("statement executed: {query}");
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Product {
        id: i64,
        category_id: i64,
        name: String,
        maker_id: i64,
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

    fn repo() -> PgRepository<Product> {
        PgRepository::new(Arc::new(catalog_schema()), "product", UnreachableExecutor).unwrap()
    }

    fn constraints() -> QueryConstraints {
        QueryConstraints::for_entity(Arc::new(catalog_schema()), "product").unwrap()
    }

    #[test]
    fn test_missing_filter_param_fails_before_execution() {
        let filter = Filter::new("\"name\" = @name AND \"id\" > @id").param("name", "x");
        let err = repo().find(Some(&filter), &constraints()).unwrap_err();
        match err {
            RepoError::Param(crate::params::ParamError::Missing { name }) => {
                assert_eq!(name, "id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_entity_mismatch_fails_before_execution() {
        let other = QueryConstraints::for_entity(Arc::new(catalog_schema()), "part").unwrap();
        let err = repo().find_all(&other).unwrap_err();
        assert!(matches!(
            err,
            RepoError::Constraint(ConstraintError::EntityMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_entity_rejected_at_construction() {
        let result: Result<PgRepository<Product>, _> =
            PgRepository::new(Arc::new(catalog_schema()), "missing", UnreachableExecutor);
        assert!(matches!(result, Err(RepoError::Schema(_))));
    }

    #[test]
    fn test_empty_batches_short_circuit() {
        let repo = repo();
        assert!(repo.create_many(Vec::new()).unwrap().is_empty());
        assert_eq!(repo.delete_many(&[]).unwrap(), 0);
    }
}
