//! Explicit entity schema, built once at startup.
//!
//! The original design discovered "columns" by reflecting over public
//! properties and registered mappings in process-wide registries. Here the
//! mapping is an explicit [`Schema`] value: constructed once through
//! [`Schema::builder`], validated at build time, and passed into repository
//! constructors. No global state, no register-once guards.
//!
//! A schema describes, per entity:
//! - scalar properties ("columns", used for INSERT/UPDATE lists and row
//!   decoding),
//! - navigation properties (collections and references, with their foreign
//!   keys, used by include/eager-load),
//! - the id property, resolved by convention (`{entity}_id` first, else `id`,
//!   case-insensitively).
//!
//! # Example
//!
//! ```
//! use depot::schema::{Schema, ScalarType};
//!
//! let schema = Schema::builder()
//!     .entity("category", "categories", |e| {
//!         e.scalar("id", ScalarType::Int64)
//!             .scalar("name", ScalarType::Text)
//!             .collection("products", "product", "category_id")
//!     })
//!     .entity("product", "products", |e| {
//!         e.scalar("id", ScalarType::Int64)
//!             .scalar("category_id", ScalarType::Int64)
//!             .scalar("name", ScalarType::Text)
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.entity("Category").unwrap().id_property().unwrap(), "id");
//! ```

pub mod path;

pub use path::PathCheck;

use std::fmt;

/// Wire/storage type of a scalar property.
///
/// Drives positional row decoding on the SQL backend and JSON conversion
/// everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Int32,
    Int64,
    Float64,
    Text,
    Uuid,
    DateTime,
    Json,
}

/// What a property is: a column, a has-many collection, or a has-one
/// reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// A plain column.
    Scalar(ScalarType),
    /// Has-many navigation. `foreign_key` is a scalar column on the *child*
    /// entity referencing this entity's id.
    Collection { entity: String, foreign_key: String },
    /// Has-one navigation. `foreign_key` is a scalar column on *this* entity
    /// referencing the target entity's id.
    Reference { entity: String, foreign_key: String },
}

/// One declared property of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name: String,
    kind: PropertyKind,
}

impl Property {
    /// Canonical (declared) property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// Whether this property is a column (scalar).
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, PropertyKind::Scalar(_))
    }
}

/// Schema for one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    table: String,
    properties: Vec<Property>,
    id_property: Option<String>,
}

impl EntitySchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing table (SQL) / key segment (blob) for this entity.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Case-insensitive property lookup returning the declared property.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// All properties in declaration order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// The column set: scalar properties in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_scalar())
    }

    /// Navigation properties (collections and references).
    pub fn navigations(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| !p.is_scalar())
    }

    /// The id property resolved at build time.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingId`] when neither `{entity}_id` nor `id`
    /// exists among the entity's scalar properties.
    pub fn id_property(&self) -> Result<&str, SchemaError> {
        self.id_property
            .as_deref()
            .ok_or_else(|| SchemaError::MissingId {
                entity: self.name.clone(),
            })
    }
}

/// Schema and mapping errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No entity with the given name is declared.
    UnknownEntity { entity: String },
    /// A property path segment did not resolve against the entity's type
    /// graph.
    UnknownProperty { entity: String, path: String },
    /// A navigation's foreign-key column does not exist where it must.
    UnknownForeignKey {
        entity: String,
        property: String,
        foreign_key: String,
    },
    /// Two entities (or two properties of one entity) share a name.
    Duplicate { name: String },
    /// No id property could be resolved by convention.
    MissingId { entity: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownEntity { entity } => {
                write!(f, "unknown entity '{entity}'")
            }
            SchemaError::UnknownProperty { entity, path } => {
                write!(f, "property path '{path}' does not resolve on entity '{entity}'")
            }
            SchemaError::UnknownForeignKey {
                entity,
                property,
                foreign_key,
            } => write!(
                f,
                "navigation '{entity}.{property}' names foreign key '{foreign_key}' \
                 which is not a scalar column"
            ),
            SchemaError::Duplicate { name } => {
                write!(f, "duplicate declaration of '{name}'")
            }
            SchemaError::MissingId { entity } => {
                write!(
                    f,
                    "entity '{entity}' has no id property ('{entity}_id' or 'id')"
                )
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// The full mapping object: every entity the application persists.
#[derive(Debug, Clone)]
pub struct Schema {
    entities: Vec<EntitySchema>,
}

impl Schema {
    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            entities: Vec::new(),
        }
    }

    /// Case-insensitive entity lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownEntity`] when no such entity is declared.
    pub fn entity(&self, name: &str) -> Result<&EntitySchema, SchemaError> {
        self.entities
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SchemaError::UnknownEntity {
                entity: name.to_string(),
            })
    }
}

/// Fluent schema builder. Validation runs in [`SchemaBuilder::build`].
pub struct SchemaBuilder {
    entities: Vec<EntitySchema>,
}

impl SchemaBuilder {
    /// Declare an entity with its backing table and properties.
    pub fn entity<F>(mut self, name: &str, table: &str, configure: F) -> Self
    where
        F: FnOnce(EntityBuilder) -> EntityBuilder,
    {
        let builder = configure(EntityBuilder {
            properties: Vec::new(),
        });
        self.entities.push(EntitySchema {
            name: name.to_string(),
            table: table.to_string(),
            properties: builder.properties,
            id_property: None,
        });
        self
    }

    /// Validate the declarations and produce the immutable [`Schema`].
    ///
    /// Resolves each entity's id property by convention and checks that every
    /// navigation's target entity and foreign-key column exist.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] encountered. A missing id is *not* an
    /// error here; it surfaces from [`EntitySchema::id_property`] when an
    /// operation actually needs the id.
    pub fn build(mut self) -> Result<Schema, SchemaError> {
        // Reject duplicate entity names up front
        for (i, entity) in self.entities.iter().enumerate() {
            if self.entities[..i]
                .iter()
                .any(|e| e.name.eq_ignore_ascii_case(&entity.name))
            {
                return Err(SchemaError::Duplicate {
                    name: entity.name.clone(),
                });
            }
            for (j, property) in entity.properties.iter().enumerate() {
                if entity.properties[..j]
                    .iter()
                    .any(|p| p.name.eq_ignore_ascii_case(&property.name))
                {
                    return Err(SchemaError::Duplicate {
                        name: format!("{}.{}", entity.name, property.name),
                    });
                }
            }
        }

        // Resolve id properties by convention: "{entity}_id" first, else "id",
        // case-insensitive and separator-insensitive.
        for entity in &mut self.entities {
            let typed = normalize(&format!("{}id", entity.name));
            entity.id_property = entity
                .properties
                .iter()
                .filter(|p| p.is_scalar())
                .find(|p| normalize(&p.name) == typed)
                .or_else(|| {
                    entity
                        .properties
                        .iter()
                        .filter(|p| p.is_scalar())
                        .find(|p| p.name.eq_ignore_ascii_case("id"))
                })
                .map(|p| p.name.clone());
        }

        // Validate navigation targets and foreign keys
        for entity in &self.entities {
            for property in entity.navigations() {
                let (target, foreign_key, fk_owner) = match property.kind() {
                    PropertyKind::Collection {
                        entity: target,
                        foreign_key,
                    } => (target, foreign_key, None),
                    PropertyKind::Reference {
                        entity: target,
                        foreign_key,
                    } => (target, foreign_key, Some(entity)),
                    PropertyKind::Scalar(_) => continue,
                };
                let target_schema = self
                    .entities
                    .iter()
                    .find(|e| e.name.eq_ignore_ascii_case(target))
                    .ok_or_else(|| SchemaError::UnknownEntity {
                        entity: target.clone(),
                    })?;
                // Collection: fk lives on the child. Reference: fk lives here.
                let owner = fk_owner.unwrap_or(target_schema);
                let fk_ok = owner
                    .property(foreign_key)
                    .map(Property::is_scalar)
                    .unwrap_or(false);
                if !fk_ok {
                    return Err(SchemaError::UnknownForeignKey {
                        entity: entity.name.clone(),
                        property: property.name.clone(),
                        foreign_key: foreign_key.clone(),
                    });
                }
            }
        }

        Ok(Schema {
            entities: self.entities,
        })
    }
}

/// Lowercase and strip `_` so `product_id`, `ProductId` and `productid` all
/// match the id convention.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Builder for one entity's property list.
pub struct EntityBuilder {
    properties: Vec<Property>,
}

impl EntityBuilder {
    /// Declare a scalar property (a column).
    pub fn scalar(mut self, name: &str, scalar_type: ScalarType) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            kind: PropertyKind::Scalar(scalar_type),
        });
        self
    }

    /// Declare a has-many navigation. `foreign_key` is the child column
    /// referencing this entity's id.
    pub fn collection(mut self, name: &str, entity: &str, foreign_key: &str) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            kind: PropertyKind::Collection {
                entity: entity.to_string(),
                foreign_key: foreign_key.to_string(),
            },
        });
        self
    }

    /// Declare a has-one navigation. `foreign_key` is the column on *this*
    /// entity referencing the target's id.
    pub fn reference(mut self, name: &str, entity: &str, foreign_key: &str) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            kind: PropertyKind::Reference {
                entity: entity.to_string(),
                foreign_key: foreign_key.to_string(),
            },
        });
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Category → products → parts graph shared by schema and constraint tests.
    pub(crate) fn catalog_schema() -> Schema {
        Schema::builder()
            .entity("category", "categories", |e| {
                e.scalar("id", ScalarType::Int64)
                    .scalar("name", ScalarType::Text)
                    .collection("products", "product", "category_id")
            })
            .entity("product", "products", |e| {
                e.scalar("id", ScalarType::Int64)
                    .scalar("category_id", ScalarType::Int64)
                    .scalar("name", ScalarType::Text)
                    .collection("parts", "part", "product_id")
                    .reference("maker", "manufacturer", "maker_id")
                    .scalar("maker_id", ScalarType::Int64)
            })
            .entity("part", "parts", |e| {
                e.scalar("id", ScalarType::Int64)
                    .scalar("product_id", ScalarType::Int64)
                    .scalar("name", ScalarType::Text)
            })
            .entity("manufacturer", "manufacturers", |e| {
                e.scalar("manufacturer_id", ScalarType::Int64)
                    .scalar("name", ScalarType::Text)
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_entity_lookup_is_case_insensitive() {
        let schema = catalog_schema();
        assert!(schema.entity("Category").is_ok());
        assert!(schema.entity("CATEGORY").is_ok());
        assert!(schema.entity("missing").is_err());
    }

    #[test]
    fn test_id_resolution_prefers_typed_name() {
        let schema = catalog_schema();
        // "manufacturer_id" matches the "{entity}_id" convention
        assert_eq!(
            schema
                .entity("manufacturer")
                .unwrap()
                .id_property()
                .unwrap(),
            "manufacturer_id"
        );
        // falls back to plain "id"
        assert_eq!(schema.entity("product").unwrap().id_property().unwrap(), "id");
    }

    #[test]
    fn test_missing_id_is_deferred_to_use() {
        let schema = Schema::builder()
            .entity("note", "notes", |e| e.scalar("body", ScalarType::Text))
            .build()
            .unwrap();
        let err = schema.entity("note").unwrap().id_property().unwrap_err();
        assert!(matches!(err, SchemaError::MissingId { .. }));
    }

    #[test]
    fn test_columns_exclude_navigations() {
        let schema = catalog_schema();
        let product = schema.entity("product").unwrap();
        let columns: Vec<_> = product.columns().map(Property::name).collect();
        assert_eq!(columns, vec!["id", "category_id", "name", "maker_id"]);
    }

    #[test]
    fn test_unknown_foreign_key_rejected_at_build() {
        let err = Schema::builder()
            .entity("parent", "parents", |e| {
                e.scalar("id", ScalarType::Int64)
                    .collection("children", "child", "nope_id")
            })
            .entity("child", "children", |e| e.scalar("id", ScalarType::Int64))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownForeignKey { .. }));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let err = Schema::builder()
            .entity("thing", "things", |e| {
                e.scalar("name", ScalarType::Text)
                    .scalar("Name", ScalarType::Text)
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { .. }));
    }
}
