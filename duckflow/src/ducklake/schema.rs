use std::borrow::Cow;

use duckflow_config::shared::{ColumnType, PipelineDefinition};
use tracing::info;

use crate::ducklake::{Connection, sql};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// Returns the SQL type declared for a pipeline column type.
///
/// Only `string` is renamed; every other type name is valid DuckDB as is.
pub fn column_sql_type(column_type: ColumnType) -> Cow<'static, str> {
    match column_type {
        ColumnType::String => Cow::Borrowed("varchar"),
        other => Cow::Owned(other.as_str().to_uppercase()),
    }
}

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for the pipeline's destination table.
pub fn build_create_table_sql(pipeline: &PipelineDefinition) -> String {
    let types: Vec<Cow<'static, str>> = pipeline
        .columns
        .iter()
        .map(|column| column_sql_type(column.column_type))
        .collect();
    let columns: Vec<(&str, &str)> = pipeline
        .columns
        .iter()
        .zip(&types)
        .map(|(column, sql_type)| (column.name.as_str(), sql_type.as_ref()))
        .collect();

    sql::create_table_if_not_exists(pipeline.destination_table(), &columns)
}

/// Makes sure the destination table exists.
///
/// Existing tables are never altered, so a table whose columns drifted from
/// the pipeline keeps its current shape.
#[derive(Debug)]
pub struct SchemaSyncer<'a> {
    connection: &'a Connection,
}

impl<'a> SchemaSyncer<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub fn sync(&self, pipeline: &PipelineDefinition) -> EtlResult<()> {
        let table = pipeline.destination_table();
        let statement = build_create_table_sql(pipeline);

        self.connection
            .raw()
            .execute_batch(&statement)
            .map_err(|e| {
                etl_error!(
                    ErrorKind::SchemaSyncFailed,
                    "Failed to create destination table",
                    table,
                    source: e
                )
            })?;

        info!(table, columns = pipeline.columns.len(), "destination table ready");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use duckflow_config::shared::{Column, Datasource, ReplicationType};

    use super::*;

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition {
            name: "prices".to_owned(),
            columns: vec![
                Column::new("Date", ColumnType::Timestamp),
                Column::new("symbol", ColumnType::String),
                Column::new("volume", ColumnType::Long),
                Column::new("price", ColumnType::Double),
            ],
            primary_keys: vec![],
            replication: ReplicationType::Append,
            datasource: Datasource::YFinance {
                symbol: "AAPL".to_owned(),
                period: "1mo".to_owned(),
                interval: "1d".to_owned(),
            },
            destination: None,
        }
    }

    #[test]
    fn only_string_is_renamed() {
        assert_eq!(column_sql_type(ColumnType::String), "varchar");
        assert_eq!(column_sql_type(ColumnType::Long), "LONG");
        assert_eq!(column_sql_type(ColumnType::Boolean), "BOOLEAN");
    }

    #[test]
    fn builds_the_table_definition() {
        assert_eq!(
            build_create_table_sql(&pipeline()),
            "CREATE TABLE IF NOT EXISTS prices (\"Date\" TIMESTAMP, symbol varchar, volume LONG, price DOUBLE)"
        );
    }

    #[test]
    fn sync_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();
        let syncer = SchemaSyncer::new(&connection);

        syncer.sync(&pipeline()).unwrap();
        connection
            .execute("INSERT INTO prices VALUES ('2024-01-02 00:00:00', 'AAPL', 10, 1.5)")
            .unwrap();
        syncer.sync(&pipeline()).unwrap();

        let count: i64 = connection
            .raw()
            .query_row("SELECT COUNT(*) FROM prices", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
