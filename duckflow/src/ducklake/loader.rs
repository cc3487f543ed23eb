use duckdb::params_from_iter;
use duckflow_config::shared::PipelineDefinition;
use tracing::{info, warn};

use crate::bail;
use crate::ducklake::replication::{ReplicationOutcome, ReplicationStrategy};
use crate::ducklake::{Connection, sql};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::types::Batch;

/// Loads a batch into the destination table inside one transaction.
#[derive(Debug)]
pub struct Loader<'a> {
    connection: &'a Connection,
}

impl<'a> Loader<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    /// Stages `batch` and merges it into the pipeline's destination table.
    ///
    /// Runs `BEGIN`, fills the `staging` table, applies the replication
    /// strategy and commits. Any failure rolls the transaction back and is
    /// returned; a failed rollback is returned alongside it. The staging table
    /// is dropped either way.
    pub fn load(
        &self,
        batch: &Batch,
        pipeline: &PipelineDefinition,
    ) -> EtlResult<ReplicationOutcome> {
        let strategy = ReplicationStrategy::for_pipeline(pipeline)?;
        let table = pipeline.destination_table();

        self.connection
            .raw()
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| {
                etl_error!(
                    ErrorKind::TransactionFailed,
                    "Failed to begin load transaction",
                    source: e
                )
            })?;

        // Without declared columns the batch is loaded as it is.
        let columns = if pipeline.columns.is_empty() {
            batch.column_names()
        } else {
            pipeline.column_names()
        };

        let result = self
            .stage(batch)
            .and_then(|()| strategy.apply(self.connection, table, columns.as_slice()));

        let result = match result {
            Ok(outcome) => self.commit().map(|()| outcome),
            Err(err) => {
                warn!(table, error = %err, "load failed, rolling back");
                Err(self.rollback(err))
            }
        };

        if let Err(err) = self.connection.raw().execute_batch(&sql::drop_staging_table()) {
            warn!(error = %err, "failed to drop staging table");
        }

        let outcome = result?;
        info!(
            table,
            strategy = %strategy,
            rows = batch.num_rows(),
            "load committed"
        );

        Ok(outcome)
    }

    /// Creates the staging table and inserts every batch row into it.
    fn stage(&self, batch: &Batch) -> EtlResult<()> {
        if batch.num_columns() == 0 {
            bail!(ErrorKind::StagingFailed, "Batch has no columns to stage");
        }

        let definitions: Vec<(&str, &str)> = batch
            .columns()
            .iter()
            .map(|series| (series.name(), series.data_type().sql_type()))
            .collect();

        let conn = self.connection.raw();
        conn.execute_batch(&sql::create_staging_table(&definitions))
            .map_err(|e| {
                etl_error!(
                    ErrorKind::StagingFailed,
                    "Failed to create staging table",
                    source: e
                )
            })?;

        let mut statement = conn
            .prepare(&sql::insert_staging_row(batch.num_columns()))
            .map_err(|e| {
                etl_error!(
                    ErrorKind::StagingFailed,
                    "Failed to prepare staging insert",
                    source: e
                )
            })?;

        for index in 0..batch.num_rows() {
            let Some(row) = batch.row(index) else {
                break;
            };

            statement
                .execute(params_from_iter(row.into_iter().map(|cell| cell.to_duckdb_value())))
                .map_err(|e| {
                    etl_error!(
                        ErrorKind::StagingFailed,
                        "Failed to stage row",
                        format!("row {index}"),
                        source: e
                    )
                })?;
        }

        info!(rows = batch.num_rows(), columns = batch.num_columns(), "staged batch");

        Ok(())
    }

    /// Commits the load transaction. A rejected commit is rolled back like any other failure.
    fn commit(&self) -> EtlResult<()> {
        self.connection
            .raw()
            .execute_batch("COMMIT")
            .map_err(|e| {
                self.rollback(etl_error!(
                    ErrorKind::TransactionFailed,
                    "Failed to commit load transaction",
                    source: e
                ))
            })
    }

    /// Rolls back and returns `cause`, aggregated with the rollback failure if there is one.
    fn rollback(&self, cause: EtlError) -> EtlError {
        match self.connection.raw().execute_batch("ROLLBACK") {
            Ok(()) => cause,
            Err(e) => {
                let rollback = etl_error!(
                    ErrorKind::TransactionFailed,
                    "Failed to roll back load transaction",
                    source: e
                );
                vec![cause, rollback].into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_commit_reports_the_failed_rollback() {
        let connection = Connection::open_in_memory().unwrap();
        let loader = Loader::new(&connection);

        // No transaction is open, so both COMMIT and ROLLBACK are refused.
        let err = loader.commit().unwrap_err();

        assert_eq!(
            err.kinds(),
            vec![ErrorKind::TransactionFailed, ErrorKind::TransactionFailed]
        );
        let errors = err.errors().unwrap();
        assert_eq!(errors[0].description(), "Failed to commit load transaction");
        assert_eq!(errors[1].description(), "Failed to roll back load transaction");
    }
}
