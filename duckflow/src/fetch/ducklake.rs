use duckdb::types::Value;
use duckflow_config::shared::PipelineDefinition;
use tracing::info;

use crate::ducklake::Connection;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::fetch::Fetcher;
use crate::types::{Batch, Cell, Series};

/// Runs a SQL query on the provisioned connection.
#[derive(Debug)]
pub struct DuckLakeFetcher<'a> {
    connection: &'a Connection,
    query: String,
}

impl<'a> DuckLakeFetcher<'a> {
    pub fn new(connection: &'a Connection, query: String) -> Self {
        Self { connection, query }
    }
}

impl Fetcher for DuckLakeFetcher<'_> {
    fn fetch(&self, pipeline: &PipelineDefinition) -> EtlResult<Batch> {
        info!(pipeline = %pipeline.name, query = %self.query, "running source query");

        let query_error = |e: duckdb::Error| {
            etl_error!(
                ErrorKind::SourceQueryFailed,
                "Source query failed",
                self.query.clone(),
                source: e
            )
        };

        let mut statement = self.connection.raw().prepare(&self.query).map_err(query_error)?;
        let mut rows = statement.query([]).map_err(query_error)?;

        let names: Vec<String> = rows
            .as_ref()
            .map(|statement| statement.column_names())
            .unwrap_or_default();
        let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];

        while let Some(row) = rows.next().map_err(query_error)? {
            for (index, name) in names.iter().enumerate() {
                let value: Value = row.get(index).map_err(query_error)?;
                columns[index].push(Cell::from_duckdb_value(name, value)?);
            }
        }

        let series = names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Series::infer(name, values))
            .collect::<EtlResult<Vec<_>>>()?;
        let batch = Batch::new(series)?;

        info!(rows = batch.num_rows(), columns = batch.num_columns(), "source query returned");

        Ok(batch)
    }
}
