use tracing::{debug, info};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// The live DuckDB handle of one pipeline run.
///
/// Owned by the run; every stage borrows it and none of them closes it.
#[derive(Debug)]
pub struct Connection {
    inner: duckdb::Connection,
}

impl Connection {
    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> EtlResult<Self> {
        let inner = duckdb::Connection::open_in_memory().map_err(|e| {
            etl_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to open DuckDB connection",
                source: e
            )
        })?;

        Ok(Self { inner })
    }

    /// Returns the engine version reported by `SELECT version()`.
    pub fn version(&self) -> EtlResult<String> {
        self.inner
            .query_row("SELECT version()", [], |row| row.get(0))
            .map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationConnectionFailed,
                    "Failed to query DuckDB version",
                    source: e
                )
            })
    }

    /// Runs one or more statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> EtlResult<()> {
        debug!(statement = sql, "executing statement");
        self.inner.execute_batch(sql)?;
        Ok(())
    }

    /// Runs a single statement and returns the number of affected rows.
    pub fn execute(&self, sql: &str) -> EtlResult<usize> {
        debug!(statement = sql, "executing statement");
        Ok(self.inner.execute(sql, [])?)
    }

    /// Gives access to the underlying handle for prepared statements and queries.
    pub fn raw(&self) -> &duckdb::Connection {
        &self.inner
    }

    /// Closes the handle, surfacing any error the engine reports on shutdown.
    pub fn close(self) -> EtlResult<()> {
        self.inner.close().map_err(|(_, e)| {
            etl_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to close DuckDB connection",
                source: e
            )
        })?;

        info!("connection released");
        Ok(())
    }
}
