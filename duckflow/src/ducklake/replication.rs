//! How a staged batch is merged into the destination table.

use std::fmt;

use duckflow_config::shared::{PipelineDefinition, ReplicationType};
use tracing::info;

use crate::bail;
use crate::ducklake::{Connection, sql};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// Rows touched by one replication run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationOutcome {
    pub deleted: usize,
    pub inserted: usize,
}

/// Replication policy resolved for one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationStrategy {
    /// Replace the destination content with the batch.
    Full,
    /// Add the batch to the destination; duplicates accumulate.
    Append,
    /// Replace destination rows sharing a primary key with the batch, keep the rest.
    Incremental { primary_keys: Vec<String> },
}

impl ReplicationStrategy {
    /// Resolves the strategy configured for `pipeline`.
    ///
    /// Incremental replication without primary keys is rejected here, before
    /// any statement runs.
    pub fn for_pipeline(pipeline: &PipelineDefinition) -> EtlResult<Self> {
        Self::new(pipeline.replication, &pipeline.primary_keys)
    }

    /// Resolves a strategy from its configuration name.
    ///
    /// Fails with [`ErrorKind::UnknownReplicationStrategy`] naming the value
    /// when it is not `full`, `append` or `incremental`.
    pub fn from_name(name: &str, primary_keys: &[String]) -> EtlResult<Self> {
        let replication = name.parse::<ReplicationType>().map_err(|e| {
            etl_error!(
                ErrorKind::UnknownReplicationStrategy,
                "Unknown replication strategy",
                name,
                source: e
            )
        })?;

        Self::new(replication, primary_keys)
    }

    fn new(replication: ReplicationType, primary_keys: &[String]) -> EtlResult<Self> {
        let strategy = match replication {
            ReplicationType::Full => ReplicationStrategy::Full,
            ReplicationType::Append => ReplicationStrategy::Append,
            ReplicationType::Incremental => {
                if primary_keys.is_empty() {
                    bail!(
                        ErrorKind::MissingPrimaryKeys,
                        "Incremental replication requires primary keys"
                    );
                }

                ReplicationStrategy::Incremental {
                    primary_keys: primary_keys.to_vec(),
                }
            }
        };

        Ok(strategy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReplicationStrategy::Full => "full",
            ReplicationStrategy::Append => "append",
            ReplicationStrategy::Incremental { .. } => "incremental",
        }
    }

    /// Returns the statements merging `staging` into `table`, in execution order.
    pub fn statements<S: AsRef<str>>(&self, table: &str, columns: &[S]) -> Vec<String> {
        match self {
            ReplicationStrategy::Full => vec![
                sql::truncate_table(table),
                sql::insert_from_staging(table, columns),
            ],
            ReplicationStrategy::Append => vec![sql::insert_from_staging(table, columns)],
            ReplicationStrategy::Incremental { primary_keys } => vec![
                sql::delete_matching_staging(table, primary_keys.as_slice()),
                sql::insert_from_staging(table, columns),
            ],
        }
    }

    /// Merges the staging table into `table`.
    ///
    /// Must run inside the load transaction, after the staging table is filled.
    pub fn apply<S: AsRef<str>>(
        &self,
        connection: &Connection,
        table: &str,
        columns: &[S],
    ) -> EtlResult<ReplicationOutcome> {
        if let ReplicationStrategy::Incremental { primary_keys } = self {
            ensure_unique_keys(connection, primary_keys)?;
        }

        let mut outcome = ReplicationOutcome::default();
        let statements = self.statements(table, columns);
        let [removal @ .., insert] = statements.as_slice() else {
            return Ok(outcome);
        };

        for statement in removal {
            outcome.deleted += execute(connection, statement, table)?;
        }
        outcome.inserted = execute(connection, insert, table)?;

        info!(
            table,
            strategy = self.name(),
            deleted = outcome.deleted,
            inserted = outcome.inserted,
            "replicated batch"
        );

        Ok(outcome)
    }
}

impl fmt::Display for ReplicationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn execute(connection: &Connection, statement: &str, table: &str) -> EtlResult<usize> {
    info!(table, statement, "running replication statement");

    connection.raw().execute(statement, []).map_err(|e| {
        etl_error!(
            ErrorKind::DestinationQueryFailed,
            "Replication statement failed",
            format!("table '{table}': {statement}"),
            source: e
        )
    })
}

/// Fails when a primary key value occurs more than once in the staging table.
fn ensure_unique_keys(connection: &Connection, primary_keys: &[String]) -> EtlResult<()> {
    let duplicates: i64 = connection
        .raw()
        .query_row(&sql::count_duplicate_keys(primary_keys), [], |row| row.get(0))
        .map_err(|e| {
            etl_error!(
                ErrorKind::StagingFailed,
                "Failed to check staged primary keys",
                source: e
            )
        })?;

    if duplicates > 0 {
        bail!(
            ErrorKind::DuplicatePrimaryKeys,
            "Batch contains duplicate primary keys",
            format!(
                "{duplicates} key value(s) of ({}) occur more than once",
                primary_keys.join(", ")
            )
        );
    }

    Ok(())
}
