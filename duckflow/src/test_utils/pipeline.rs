use duckflow_config::shared::{
    Column, ColumnType, Datasource, PipelineDefinition, ReplicationType,
};

use crate::types::{Batch, Cell, DataType, Series};

/// Name of the destination table used by [`people_pipeline`].
pub const PEOPLE_TABLE: &str = "people";

/// Builds a pipeline reading from a `ducklake` query that tests never run.
pub fn create_pipeline(
    name: &str,
    columns: Vec<Column>,
    replication: ReplicationType,
    primary_keys: &[&str],
) -> PipelineDefinition {
    PipelineDefinition {
        name: name.to_owned(),
        columns,
        primary_keys: primary_keys.iter().map(|key| key.to_string()).collect(),
        replication,
        datasource: Datasource::DuckLake {
            query: "SELECT 1".to_owned(),
        },
        destination: None,
    }
}

/// A `people (id long, title string)` pipeline keyed on `id` when incremental.
pub fn people_pipeline(replication: ReplicationType) -> PipelineDefinition {
    let primary_keys: &[&str] = match replication {
        ReplicationType::Incremental => &["id"],
        ReplicationType::Full | ReplicationType::Append => &[],
    };

    create_pipeline(
        PEOPLE_TABLE,
        vec![
            Column::new("id", ColumnType::Long),
            Column::new("title", ColumnType::String),
        ],
        replication,
        primary_keys,
    )
}

/// A batch matching [`people_pipeline`].
pub fn people_batch(rows: &[(i64, &str)]) -> Batch {
    let ids = rows.iter().map(|(id, _)| Cell::I64(*id)).collect();
    let titles = rows
        .iter()
        .map(|(_, title)| Cell::String(title.to_string()))
        .collect();

    Batch::new(vec![
        Series::new("id", DataType::Int64, ids).expect("ids are integers"),
        Series::new("title", DataType::Utf8, titles).expect("titles are strings"),
    ])
    .expect("people columns have the same length")
}
