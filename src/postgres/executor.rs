//! Execution abstraction over `may_postgres`.
//!
//! [`PgExecutor`] is the seam between SQL construction and the wire: the
//! repository builds statements and hands them here, so tests and pooled or
//! transactional clients can swap in without touching query logic.

use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::time::Instant;

/// Executes SQL statements against PostgreSQL.
pub trait PgExecutor {
    /// Run a statement and return the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns the driver error when execution fails.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, PostgresError>;

    /// Run a query expected to produce exactly one row.
    ///
    /// # Errors
    ///
    /// Returns the driver error when execution fails or the row count is not
    /// exactly one.
    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, PostgresError>;

    /// Run a query and return all rows.
    ///
    /// # Errors
    ///
    /// Returns the driver error when execution fails.
    fn query_all(
        &self,
        query: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Row>, PostgresError>;
}

/// The production executor: a plain `may_postgres::Client`.
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn into_client(self) -> Client {
        self.client
    }
}

impl PgExecutor for MayPostgresExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, PostgresError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("pg_execute", sql = query).entered();

        let start = Instant::now();
        let result = self.client.execute(query, params);
        log::trace!("execute ({:?}): {query}", start.elapsed());
        result
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, PostgresError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("pg_query_one", sql = query).entered();

        let start = Instant::now();
        let result = self.client.query_one(query, params);
        log::trace!("query_one ({:?}): {query}", start.elapsed());
        result
    }

    fn query_all(
        &self,
        query: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Row>, PostgresError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("pg_query_all", sql = query).entered();

        let start = Instant::now();
        let result = self.client.query(query, params);
        log::trace!("query_all ({:?}): {query}", start.elapsed());
        result
    }
}
