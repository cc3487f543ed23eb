use duckflow::ducklake::{Connection, SchemaSyncer};
use duckflow::test_utils::pipeline::{PEOPLE_TABLE, create_pipeline, people_pipeline};
use duckflow::test_utils::table::{count_rows, query_rows, table_exists};
use duckflow::types::Cell;
use duckflow_config::shared::{Column, ColumnType, Destination, ReplicationType};
use duckflow_telemetry::tracing::init_test_tracing;

#[test]
fn sync_twice_keeps_existing_rows_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    let pipeline = people_pipeline(ReplicationType::Full);
    let syncer = SchemaSyncer::new(&connection);

    syncer.sync(&pipeline).unwrap();
    connection
        .execute_batch("INSERT INTO people VALUES (1, 'A')")
        .unwrap();
    syncer.sync(&pipeline).unwrap();

    assert!(table_exists(&connection, PEOPLE_TABLE));
    assert_eq!(count_rows(&connection, PEOPLE_TABLE), 1);
}

#[test]
fn sync_maps_column_types_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    let pipeline = create_pipeline(
        "typed",
        vec![
            Column::new("Date", ColumnType::Timestamp),
            Column::new("day", ColumnType::Date),
            Column::new("symbol", ColumnType::String),
            Column::new("volume", ColumnType::Long),
            Column::new("shares", ColumnType::Integer),
            Column::new("price", ColumnType::Double),
            Column::new("ratio", ColumnType::Float),
            Column::new("active", ColumnType::Boolean),
        ],
        ReplicationType::Append,
        &[],
    );

    SchemaSyncer::new(&connection).sync(&pipeline).unwrap();

    let types = query_rows(
        &connection,
        "SELECT data_type FROM information_schema.columns \
         WHERE table_name = 'typed' ORDER BY ordinal_position",
    );
    let expected = [
        "TIMESTAMP", "DATE", "VARCHAR", "BIGINT", "INTEGER", "DOUBLE", "FLOAT", "BOOLEAN",
    ];
    assert_eq!(
        types,
        expected
            .iter()
            .map(|name| vec![Cell::String(name.to_string())])
            .collect::<Vec<_>>()
    );
}

#[test]
fn sync_uses_destination_table_name_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    let mut pipeline = people_pipeline(ReplicationType::Append);
    pipeline.destination = Some(Destination::DuckLake {
        table: Some("staff".to_owned()),
    });

    SchemaSyncer::new(&connection).sync(&pipeline).unwrap();

    assert!(table_exists(&connection, "staff"));
    assert!(!table_exists(&connection, PEOPLE_TABLE));
}
