//! Named-placeholder validation and binding.
//!
//! Backends that accept a free-form filter string (raw SQL fragments, REST
//! path/query templates) run it through the same gate before anything
//! executes: every placeholder the pattern finds must have a supplied
//! parameter value, otherwise the call fails with the missing name. Extra
//! parameters that the text never references are tolerated.
//!
//! The placeholder pattern is a configurable regex. Two stock patterns ship:
//! `@(\w+)` for SQL filters and `{name}` for REST templates.
//!
//! # Example
//!
//! ```
//! use depot::params::{ParamSet, PlaceholderPattern};
//!
//! let params = ParamSet::new().set("id", 42i64);
//! let pattern = PlaceholderPattern::sql();
//!
//! pattern.validate("price > 10 AND id = @id", &params).unwrap();
//! assert!(pattern.validate("owner = @owner", &params).is_err());
//! ```

use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Default SQL placeholder pattern: `@name`.
pub const SQL_PLACEHOLDER_PATTERN: &str = r"@(\w+)";
/// Default REST template pattern: `{name}`.
pub const REST_PLACEHOLDER_PATTERN: &str = r"\{(\w+)\}";

static SQL_PATTERN: Lazy<PlaceholderPattern> = Lazy::new(|| {
    // The stock patterns are compile-checked by tests; unwrap is safe here
    // only because the literals above are constants.
    PlaceholderPattern::new(SQL_PLACEHOLDER_PATTERN).unwrap()
});

static REST_PATTERN: Lazy<PlaceholderPattern> =
    Lazy::new(|| PlaceholderPattern::new(REST_PLACEHOLDER_PATTERN).unwrap());

/// Parameter-gate errors.
#[derive(Debug, Clone)]
pub enum ParamError {
    /// The filter references a placeholder with no supplied value. Raised
    /// before any query executes.
    Missing { name: String },
    /// The configured placeholder pattern is not a valid regex.
    Pattern { pattern: String, message: String },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::Missing { name } => {
                write!(f, "no value supplied for parameter '{name}'")
            }
            ParamError::Pattern { pattern, message } => {
                write!(f, "invalid placeholder pattern '{pattern}': {message}")
            }
        }
    }
}

impl std::error::Error for ParamError {}

/// Ordered name → [`Value`] parameter mapping.
///
/// Setting an existing name replaces its value in place; iteration follows
/// first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    entries: Vec<(String, Value)>,
}

impl ParamSet {
    pub fn new() -> Self {
        ParamSet::default()
    }

    /// Set a parameter, replacing any previous value under the same name.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
        self
    }

    /// Look up a parameter by exact name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Drop all parameters.
    pub fn clear(mut self) -> Self {
        self.entries.clear();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// A compiled placeholder pattern.
///
/// The identifier of each occurrence is capture group 1 when the pattern has
/// one, otherwise the whole match with leading `@`/`:`/`{` punctuation (and a
/// trailing `}`) stripped.
#[derive(Debug, Clone)]
pub struct PlaceholderPattern {
    regex: Regex,
}

impl PlaceholderPattern {
    /// Compile a custom pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Pattern`] when the regex does not compile.
    pub fn new(pattern: &str) -> Result<Self, ParamError> {
        let regex = Regex::new(pattern).map_err(|e| ParamError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(PlaceholderPattern { regex })
    }

    /// The stock SQL pattern (`@name`).
    pub fn sql() -> &'static Self {
        &SQL_PATTERN
    }

    /// The stock REST template pattern (`{name}`).
    pub fn rest() -> &'static Self {
        &REST_PATTERN
    }

    /// All placeholder identifiers in `text`, in occurrence order, with
    /// repeats preserved.
    pub fn placeholders<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.regex
            .captures_iter(text)
            .map(|c| match c.get(1) {
                Some(group) => group.as_str(),
                None => strip_punctuation(c.get(0).map(|m| m.as_str()).unwrap_or("")),
            })
            .collect()
    }

    /// Check that every placeholder has a supplied parameter.
    ///
    /// Runs before the query; extra parameters are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Missing`] naming the first unresolved
    /// placeholder.
    pub fn validate(&self, text: &str, params: &ParamSet) -> Result<(), ParamError> {
        for name in self.placeholders(text) {
            if !params.contains(name) {
                return Err(ParamError::Missing {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate and rewrite placeholders to numbered `$n` binds.
    ///
    /// Numbers are assigned by first occurrence; a repeated name reuses its
    /// number. Returns the rewritten text and the values in bind order.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Missing`] for the first unresolved placeholder.
    pub fn bind<'p>(
        &self,
        text: &str,
        params: &'p ParamSet,
    ) -> Result<(String, Vec<&'p Value>), ParamError> {
        self.validate(text, params)?;

        let mut order: Vec<&str> = Vec::new();
        let mut rewritten = String::with_capacity(text.len());
        let mut last_end = 0;
        for captures in self.regex.captures_iter(text) {
            let whole = captures.get(0).map(|m| m.as_str()).unwrap_or("");
            let name = match captures.get(1) {
                Some(group) => group.as_str(),
                None => strip_punctuation(whole),
            };
            let position = match order.iter().position(|n| *n == name) {
                Some(i) => i,
                None => {
                    order.push(name);
                    order.len() - 1
                }
            };
            let m = captures.get(0).map(|m| m.range()).unwrap_or(0..0);
            rewritten.push_str(&text[last_end..m.start]);
            rewritten.push_str(&format!("${}", position + 1));
            last_end = m.end;
        }
        rewritten.push_str(&text[last_end..]);

        // validate() guaranteed presence above
        let values = order
            .iter()
            .map(|name| {
                params.get(name).ok_or_else(|| ParamError::Missing {
                    name: (*name).to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rewritten, values))
    }

    /// Validate and splice rendered parameter values into the template
    /// (REST paths and query strings).
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Missing`] for the first unresolved placeholder.
    pub fn substitute(&self, text: &str, params: &ParamSet) -> Result<String, ParamError> {
        self.validate(text, params)?;

        let mut rendered = String::with_capacity(text.len());
        let mut last_end = 0;
        for captures in self.regex.captures_iter(text) {
            let whole = captures.get(0).map(|m| m.as_str()).unwrap_or("");
            let name = match captures.get(1) {
                Some(group) => group.as_str(),
                None => strip_punctuation(whole),
            };
            let value = params.get(name).ok_or_else(|| ParamError::Missing {
                name: name.to_string(),
            })?;
            let m = captures.get(0).map(|m| m.range()).unwrap_or(0..0);
            rendered.push_str(&text[last_end..m.start]);
            rendered.push_str(&value.to_string());
            last_end = m.end;
        }
        rendered.push_str(&text[last_end..]);
        Ok(rendered)
    }
}

fn strip_punctuation(token: &str) -> &str {
    token
        .trim_start_matches(['@', ':', '{'])
        .trim_end_matches('}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_fails_fast() {
        let err = PlaceholderPattern::sql()
            .validate("SELECT * FROM t WHERE id > @Id", &ParamSet::new())
            .unwrap_err();
        match err {
            ParamError::Missing { name } => assert_eq!(name, "Id"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_extra_parameters_tolerated() {
        let params = ParamSet::new().set("id", 1i64).set("unused", "x");
        assert!(PlaceholderPattern::sql()
            .validate("id = @id", &params)
            .is_ok());
    }

    #[test]
    fn test_bind_numbers_by_first_occurrence() {
        let params = ParamSet::new().set("min", 1i64).set("max", 9i64);
        let (sql, values) = PlaceholderPattern::sql()
            .bind("v >= @min AND v <= @max AND v <> @min", &params)
            .unwrap();
        assert_eq!(sql, "v >= $1 AND v <= $2 AND v <> $1");
        assert_eq!(values.len(), 2);
        assert_eq!(*values[0], Value::Int(1));
        assert_eq!(*values[1], Value::Int(9));
    }

    #[test]
    fn test_bind_without_placeholders_is_identity() {
        let (sql, values) = PlaceholderPattern::sql()
            .bind("active = true", &ParamSet::new())
            .unwrap();
        assert_eq!(sql, "active = true");
        assert!(values.is_empty());
    }

    #[test]
    fn test_custom_pattern_with_colon_prefix() {
        // A pattern without a capture group falls back to punctuation
        // stripping.
        let pattern = PlaceholderPattern::new(r":\w+").unwrap();
        assert_eq!(pattern.placeholders("a = :a AND b = :b"), vec!["a", "b"]);
    }

    #[test]
    fn test_rest_substitution() {
        let params = ParamSet::new().set("id", 7i64);
        let path = PlaceholderPattern::rest()
            .substitute("/products/{id}/parts", &params)
            .unwrap();
        assert_eq!(path, "/products/7/parts");
    }

    #[test]
    fn test_rest_substitution_missing_fails() {
        let err = PlaceholderPattern::rest()
            .substitute("/products/{id}", &ParamSet::new())
            .unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn test_set_replaces_existing_name() {
        let params = ParamSet::new().set("id", 1i64).set("id", 2i64);
        assert_eq!(params.get("id"), Some(&Value::Int(2)));
        assert_eq!(params.iter().count(), 1);
    }

    #[test]
    fn test_invalid_pattern_reports_error() {
        assert!(matches!(
            PlaceholderPattern::new("(unclosed"),
            Err(ParamError::Pattern { .. })
        ));
    }
}
