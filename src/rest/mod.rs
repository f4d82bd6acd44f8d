//! REST repository: CRUD against a remote HTTP API.
//!
//! The remote resource lives at `{base_url}/{table}` with the usual
//! conventions: `POST` to the collection, `GET`/`PUT`/`DELETE` on
//! `/{id}`, a JSON array from the collection endpoint. A [`Filter`]'s text
//! is a query-string template with `{name}` placeholders filled from its
//! parameters, validated through the same gate as SQL filters before any
//! request goes out.
//!
//! Sorting, paging and includes report `Unsupported`: the remote contract
//! cannot guarantee the unpaged `total_count` a paged result promises.

use crate::constraints::{ConstraintError, QueryConstraints, QueryResult};
use crate::params::PlaceholderPattern;
use crate::record::Record;
use crate::repository::{ApiError, Capabilities, Filter, RepoError, Repository};
use crate::schema::Schema;
use crate::value::Value;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct RestRepository<T> {
    schema: Arc<Schema>,
    entity: String,
    agent: ureq::Agent,
    base_url: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RestRepository<T> {
    /// Create a repository for one entity against a base URL
    /// (e.g. `https://api.example.com/v1`).
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Schema`] when the entity is not declared.
    pub fn new(schema: Arc<Schema>, entity: &str, base_url: &str) -> Result<Self, RepoError> {
        Self::with_agent(schema, entity, base_url, ureq::agent())
    }

    /// Same as [`RestRepository::new`] with a preconfigured agent (timeouts,
    /// proxy, TLS).
    pub fn with_agent(
        schema: Arc<Schema>,
        entity: &str,
        base_url: &str,
        agent: ureq::Agent,
    ) -> Result<Self, RepoError> {
        let canonical = schema.entity(entity)?.name().to_string();
        Ok(RestRepository {
            schema,
            entity: canonical,
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            _marker: PhantomData,
        })
    }

    fn collection_url(&self) -> Result<String, RepoError> {
        Ok(format!(
            "{}/{}",
            self.base_url,
            self.schema.entity(&self.entity)?.table()
        ))
    }

    fn item_url(&self, id: &Value) -> Result<String, RepoError> {
        Ok(format!("{}/{id}", self.collection_url()?))
    }

    fn id_of(&self, entity: &T) -> Result<Value, RepoError> {
        let id_property = self.schema.entity(&self.entity)?.id_property()?;
        Ok(entity.get(id_property).unwrap_or(Value::Null))
    }

    /// Send a request, turning non-success statuses into [`ApiError`].
    fn send(
        &self,
        method: &str,
        url: &str,
        body: Option<&T>,
    ) -> Result<(u16, String), RepoError> {
        log::debug!("{method} {url}");
        let request = self
            .agent
            .request(method, url)
            .set("Accept", "application/json");
        let outcome = match body {
            Some(entity) => {
                let payload = serde_json::to_string(entity)?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
            None => request.call(),
        };
        match outcome {
            Ok(response) => {
                let status = response.status();
                let text = response.into_string()?;
                Ok((status, text))
            }
            Err(ureq::Error::Status(status, response)) => Err(RepoError::Api(ApiError {
                method: method.to_string(),
                path: url.to_string(),
                status,
                body: response.into_string().unwrap_or_default(),
            })),
            Err(ureq::Error::Transport(transport)) => Err(RepoError::Http(Box::new(transport))),
        }
    }

    /// Parse a response body as the entity, falling back to the sent entity
    /// when the server answers with an empty body.
    fn entity_or_echo(&self, body: &str, sent: T) -> Result<T, RepoError> {
        if body.trim().is_empty() {
            return Ok(sent);
        }
        Ok(serde_json::from_str(body)?)
    }
}

impl<T: Record> Repository<T> for RestRepository<T> {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            sorting: false,
            paging: false,
            includes: false,
            filters: true,
        }
    }

    fn create(&self, entity: T) -> Result<T, RepoError> {
        let url = self.collection_url()?;
        let (_, body) = self.send("POST", &url, Some(&entity))?;
        self.entity_or_echo(&body, entity)
    }

    fn create_many(&self, entities: Vec<T>) -> Result<Vec<T>, RepoError> {
        let mut created = Vec::with_capacity(entities.len());
        for entity in entities {
            created.push(self.create(entity)?);
        }
        Ok(created)
    }

    fn update(&self, entity: T) -> Result<T, RepoError> {
        let id = self.id_of(&entity)?;
        let url = self.item_url(&id)?;
        match self.send("PUT", &url, Some(&entity)) {
            Ok((_, body)) => self.entity_or_echo(&body, entity),
            Err(RepoError::Api(e)) if e.status == 404 => {
                Err(RepoError::not_found(&self.entity, &id))
            }
            Err(e) => Err(e),
        }
    }

    fn delete(&self, id: &Value) -> Result<(), RepoError> {
        let url = self.item_url(id)?;
        match self.send("DELETE", &url, None) {
            Ok(_) => Ok(()),
            Err(RepoError::Api(e)) if e.status == 404 => {
                Err(RepoError::not_found(&self.entity, id))
            }
            Err(e) => Err(e),
        }
    }

    fn delete_many(&self, ids: &[Value]) -> Result<usize, RepoError> {
        let mut deleted = 0;
        for id in ids {
            match self.delete(id) {
                Ok(()) => deleted += 1,
                Err(RepoError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(deleted)
    }

    fn get_by_id(&self, id: &Value) -> Result<Option<T>, RepoError> {
        let url = self.item_url(id)?;
        match self.send("GET", &url, None) {
            Ok((_, body)) => Ok(Some(serde_json::from_str(&body)?)),
            Err(RepoError::Api(e)) if e.status == 404 => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `GET` on the collection, with the filter rendered as a query string.
    /// Template placeholders are validated before the request is sent.
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
        let url = match filter {
            Some(f) => {
                let query = PlaceholderPattern::rest().substitute(f.text(), f.params())?;
                format!("{}?{query}", self.collection_url()?)
            }
            None => self.collection_url()?,
        };
        let (_, body) = self.send("GET", &url, None)?;
        let items: Vec<T> = serde_json::from_str(&body)?;
        let total = items.len();
        Ok(QueryResult::new(items, total, 1, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamError;
    use crate::schema::tests::catalog_schema;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Part {
        id: i64,
        product_id: i64,
        name: String,
    }

    impl Record for Part {
        fn get(&self, property: &str) -> Option<Value> {
            match property {
                "id" => Some(Value::Int(self.id)),
                "product_id" => Some(Value::Int(self.product_id)),
                "name" => Some(Value::Text(self.name.clone())),
                _ => None,
            }
        }
    }

    fn repo() -> RestRepository<Part> {
        // unroutable address: tests below must fail before any request
        RestRepository::new(
            Arc::new(catalog_schema()),
            "part",
            "http://127.0.0.1:1/api/",
        )
        .unwrap()
    }

    fn constraints() -> QueryConstraints {
        QueryConstraints::for_entity(Arc::new(catalog_schema()), "part").unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let repo = repo();
        assert_eq!(
            repo.collection_url().unwrap(),
            "http://127.0.0.1:1/api/parts"
        );
        assert_eq!(
            repo.item_url(&Value::Int(7)).unwrap(),
            "http://127.0.0.1:1/api/parts/7"
        );
    }

    #[test]
    fn test_missing_template_param_fails_before_request() {
        let filter = Filter::new("product={product_id}&q={q}").param("q", "bolt");
        let err = repo().find(Some(&filter), &constraints()).unwrap_err();
        match err {
            RepoError::Param(ParamError::Missing { name }) => assert_eq!(name, "product_id"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_paging_is_unsupported() {
        let err = repo()
            .find_all(&constraints().page(1, 10).unwrap())
            .unwrap_err();
        assert!(matches!(err, RepoError::Unsupported { feature } if feature == "paging"));
    }

    #[test]
    fn test_includes_are_unsupported() {
        let product = QueryConstraints::for_entity(Arc::new(catalog_schema()), "product").unwrap();
        let repo: RestRepository<Part> = RestRepository::new(
            Arc::new(catalog_schema()),
            "product",
            "http://127.0.0.1:1",
        )
        .unwrap();
        let err = repo
            .find_all(&product.include("parts").unwrap())
            .unwrap_err();
        assert!(matches!(err, RepoError::Unsupported { feature } if feature == "includes"));
    }
}
