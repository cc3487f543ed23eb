//! Runs one pipeline end to end.

use std::path::Path;

use duckflow_config::shared::{ConnectionSettings, PipelineDefinition};
use tracing::{error, info};

use crate::ducklake::{Connection, Loader, ReplicationOutcome, SchemaSyncer, provision};
use crate::error::EtlResult;
use crate::fetch::{Fetcher, create_fetcher};
use crate::transform::transform;

/// Drives sync, fetch, transform and load over one provisioned connection.
#[derive(Debug)]
pub struct PipelineRunner<'a> {
    connection: &'a Connection,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    /// Runs `pipeline` reading its batch from `fetcher`.
    ///
    /// Failures are logged and returned unchanged.
    pub fn run_with(
        &self,
        pipeline: &PipelineDefinition,
        fetcher: &dyn Fetcher,
    ) -> EtlResult<ReplicationOutcome> {
        info!(pipeline = %pipeline.name, "starting pipeline execution");

        let result = self.run_stages(pipeline, fetcher);
        match &result {
            Ok(outcome) => info!(
                pipeline = %pipeline.name,
                deleted = outcome.deleted,
                inserted = outcome.inserted,
                "pipeline execution completed"
            ),
            Err(err) => error!(pipeline = %pipeline.name, error = %err, "pipeline execution failed"),
        }

        result
    }

    fn run_stages(
        &self,
        pipeline: &PipelineDefinition,
        fetcher: &dyn Fetcher,
    ) -> EtlResult<ReplicationOutcome> {
        info!(table = pipeline.destination_table(), "syncing destination schema");
        SchemaSyncer::new(self.connection).sync(pipeline)?;

        info!(datasource = pipeline.datasource.kind(), "fetching data");
        let mut batch = fetcher.fetch(pipeline)?;
        info!(rows = batch.num_rows(), "fetched rows");

        if pipeline.has_transforms() {
            info!("applying column transforms");
            batch = transform(batch, &pipeline.columns)?;
            info!(columns = batch.num_columns(), "column transforms applied");
        }

        info!(
            rows = batch.num_rows(),
            table = pipeline.destination_table(),
            "loading rows"
        );
        Loader::new(self.connection).load(&batch, pipeline)
    }
}

/// Provisions a connection, runs `pipeline` with the fetcher its datasource
/// calls for and closes the connection.
///
/// Credential files named by the datasource are resolved against `secrets_dir`.
pub fn run_pipeline(
    settings: &ConnectionSettings,
    pipeline: &PipelineDefinition,
    secrets_dir: &Path,
) -> EtlResult<ReplicationOutcome> {
    let connection = provision(settings)?;

    let outcome = {
        let fetcher = create_fetcher(pipeline, &connection, secrets_dir)?;
        PipelineRunner::new(&connection).run_with(pipeline, fetcher.as_ref())?
    };

    connection.close()?;

    Ok(outcome)
}
