//! Dotted property-path validation and case canonicalization.
//!
//! A property path addresses a nested property through the entity graph,
//! e.g. `"products.parts"` from a category. Validation walks each dotted
//! segment case-insensitively, rewrites it to the declared casing, and
//! descends: collections and references descend into their target entity,
//! scalars are terminal.
//!
//! Two surfaces exist for the two call sites:
//! - `try_*`: returns a [`PathCheck`] flag + path pair; an invalid path keeps
//!   the *original, unmodified* input so callers can echo it back.
//! - strict (`property_path` / `property_name`): returns
//!   [`SchemaError::UnknownProperty`]; used by fluent `sort_by`/`include`
//!   setters that must fail immediately on bad input.

use crate::schema::{PropertyKind, Schema, SchemaError};

/// Outcome of a non-strict path check.
///
/// When `is_valid` is true, `path` carries the canonically-cased path; when
/// false it carries the original input untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCheck {
    pub is_valid: bool,
    pub path: String,
}

impl PathCheck {
    fn valid(path: String) -> Self {
        PathCheck {
            is_valid: true,
            path,
        }
    }

    fn invalid(original: &str) -> Self {
        PathCheck {
            is_valid: false,
            path: original.to_string(),
        }
    }
}

impl Schema {
    /// Validate a single property name against an entity, case-insensitively.
    ///
    /// Returns the canonical casing on success, the original input on failure.
    pub fn try_property_name(&self, entity: &str, name: &str) -> PathCheck {
        if name.contains('.') {
            return PathCheck::invalid(name);
        }
        self.try_property_path(entity, name)
    }

    /// Validate a dotted property path against an entity's type graph.
    ///
    /// Walks every segment; each must resolve (case-insensitively) on the
    /// entity reached so far. A scalar segment is terminal: anything after it
    /// fails. The canonical path joins the declared casings with `.`.
    pub fn try_property_path(&self, entity: &str, path: &str) -> PathCheck {
        let Ok(mut current) = self.entity(entity) else {
            return PathCheck::invalid(path);
        };
        if path.is_empty() {
            return PathCheck::invalid(path);
        }

        let mut canonical: Vec<String> = Vec::new();
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let Some(property) = current.property(segment) else {
                return PathCheck::invalid(path);
            };
            canonical.push(property.name().to_string());
            match property.kind() {
                PropertyKind::Collection { entity: target, .. }
                | PropertyKind::Reference { entity: target, .. } => {
                    match self.entity(target) {
                        Ok(next) => current = next,
                        Err(_) => return PathCheck::invalid(path),
                    }
                }
                PropertyKind::Scalar(_) => {
                    // Scalars have no further properties to descend into
                    if segments.peek().is_some() {
                        return PathCheck::invalid(path);
                    }
                }
            }
        }

        PathCheck::valid(canonical.join("."))
    }

    /// Strict single-name validation.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownProperty`] naming the path and entity.
    pub fn property_name(&self, entity: &str, name: &str) -> Result<String, SchemaError> {
        let check = self.try_property_name(entity, name);
        if check.is_valid {
            Ok(check.path)
        } else {
            Err(SchemaError::UnknownProperty {
                entity: entity.to_string(),
                path: name.to_string(),
            })
        }
    }

    /// Strict path validation.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownProperty`] naming the path and entity.
    pub fn property_path(&self, entity: &str, path: &str) -> Result<String, SchemaError> {
        let check = self.try_property_path(entity, path);
        if check.is_valid {
            Ok(check.path)
        } else {
            Err(SchemaError::UnknownProperty {
                entity: entity.to_string(),
                path: path.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::tests::catalog_schema;
    use crate::schema::SchemaError;

    #[test]
    fn test_casing_variants_canonicalize_identically() {
        let schema = catalog_schema();
        for variant in ["products.parts", "Products.Parts", "pRoducts.pARts"] {
            let check = schema.try_property_path("category", variant);
            assert!(check.is_valid, "{variant} should validate");
            assert_eq!(check.path, "products.parts");
        }
    }

    #[test]
    fn test_invalid_path_returns_original_unmodified() {
        let schema = catalog_schema();
        let check = schema.try_property_path("category", "Donald.Duck");
        assert!(!check.is_valid);
        assert_eq!(check.path, "Donald.Duck");
    }

    #[test]
    fn test_partial_resolution_still_fails_whole_path() {
        let schema = catalog_schema();
        // "products" resolves, "serial" does not
        let check = schema.try_property_path("category", "Products.serial");
        assert!(!check.is_valid);
        assert_eq!(check.path, "Products.serial");
    }

    #[test]
    fn test_scalar_segment_is_terminal() {
        let schema = catalog_schema();
        assert!(schema.try_property_path("category", "name").is_valid);
        assert!(!schema.try_property_path("category", "name.length").is_valid);
    }

    #[test]
    fn test_reference_descends_into_target() {
        let schema = catalog_schema();
        let check = schema.try_property_path("product", "Maker.Name");
        assert!(check.is_valid);
        assert_eq!(check.path, "maker.name");
    }

    #[test]
    fn test_property_name_rejects_dotted_input() {
        let schema = catalog_schema();
        assert!(!schema.try_property_name("category", "products.parts").is_valid);
        assert!(schema.try_property_name("category", "NAME").is_valid);
    }

    #[test]
    fn test_strict_variant_reports_entity_and_path() {
        let schema = catalog_schema();
        let err = schema.property_path("category", "bogus").unwrap_err();
        match err {
            SchemaError::UnknownProperty { entity, path } => {
                assert_eq!(entity, "category");
                assert_eq!(path, "bogus");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("bogus"));
        assert!(err.to_string().contains("category"));
    }

    #[test]
    fn test_empty_path_is_invalid() {
        let schema = catalog_schema();
        assert!(!schema.try_property_path("category", "").is_valid);
    }
}
