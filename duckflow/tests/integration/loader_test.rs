use duckflow::ducklake::{Connection, Loader, ReplicationOutcome, SchemaSyncer};
use duckflow::error::ErrorKind;
use duckflow::test_utils::pipeline::{PEOPLE_TABLE, create_pipeline, people_batch, people_pipeline};
use duckflow::test_utils::table::{count_rows, people_rows, table_exists};
use duckflow::types::{Batch, Cell, DataType, Series};
use duckflow_config::shared::ReplicationType;
use duckflow_telemetry::tracing::init_test_tracing;

fn people(rows: &[(i64, &str)]) -> Vec<(i64, String)> {
    rows.iter().map(|(id, title)| (*id, title.to_string())).collect()
}

fn connection_with_people(replication: ReplicationType) -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    SchemaSyncer::new(&connection)
        .sync(&people_pipeline(replication))
        .unwrap();
    connection
}

#[test]
fn full_replication_is_idempotent_test() {
    init_test_tracing();
    let connection = connection_with_people(ReplicationType::Full);
    let pipeline = people_pipeline(ReplicationType::Full);
    let batch = people_batch(&[(1, "A"), (2, "B")]);
    let loader = Loader::new(&connection);

    loader.load(&batch, &pipeline).unwrap();
    let first = people_rows(&connection, PEOPLE_TABLE);
    loader.load(&batch, &pipeline).unwrap();

    assert_eq!(first, people(&[(1, "A"), (2, "B")]));
    assert_eq!(people_rows(&connection, PEOPLE_TABLE), first);
}

#[test]
fn full_replication_replaces_existing_rows_test() {
    init_test_tracing();
    let connection = connection_with_people(ReplicationType::Full);
    let pipeline = people_pipeline(ReplicationType::Full);
    let loader = Loader::new(&connection);

    loader
        .load(&people_batch(&[(1, "A"), (2, "B"), (3, "C")]), &pipeline)
        .unwrap();
    let outcome = loader.load(&people_batch(&[(7, "G")]), &pipeline).unwrap();

    assert_eq!(outcome.inserted, 1);
    assert_eq!(people_rows(&connection, PEOPLE_TABLE), people(&[(7, "G")]));
}

#[test]
fn append_replication_accumulates_every_load_test() {
    init_test_tracing();
    let connection = connection_with_people(ReplicationType::Append);
    let pipeline = people_pipeline(ReplicationType::Append);
    let batch = people_batch(&[(1, "A"), (2, "B")]);
    let loader = Loader::new(&connection);

    for _ in 0..3 {
        let outcome = loader.load(&batch, &pipeline).unwrap();
        assert_eq!(
            outcome,
            ReplicationOutcome {
                deleted: 0,
                inserted: 2
            }
        );
    }

    assert_eq!(count_rows(&connection, PEOPLE_TABLE), 6);
}

#[test]
fn incremental_replication_upserts_by_primary_key_test() {
    init_test_tracing();
    let connection = connection_with_people(ReplicationType::Incremental);
    let pipeline = people_pipeline(ReplicationType::Incremental);
    let loader = Loader::new(&connection);

    loader
        .load(&people_batch(&[(1, "A"), (2, "B")]), &pipeline)
        .unwrap();
    let outcome = loader
        .load(&people_batch(&[(2, "B2"), (3, "C")]), &pipeline)
        .unwrap();

    assert_eq!(
        outcome,
        ReplicationOutcome {
            deleted: 1,
            inserted: 2
        }
    );
    assert_eq!(
        people_rows(&connection, PEOPLE_TABLE),
        people(&[(1, "A"), (2, "B2"), (3, "C")])
    );
}

#[test]
fn incremental_replication_rejects_duplicate_keys_test() {
    init_test_tracing();
    let connection = connection_with_people(ReplicationType::Incremental);
    let pipeline = people_pipeline(ReplicationType::Incremental);
    let loader = Loader::new(&connection);

    loader.load(&people_batch(&[(1, "A")]), &pipeline).unwrap();
    let err = loader
        .load(&people_batch(&[(2, "B"), (2, "B2")]), &pipeline)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicatePrimaryKeys);
    assert_eq!(people_rows(&connection, PEOPLE_TABLE), people(&[(1, "A")]));
}

#[test]
fn failed_load_leaves_destination_untouched_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    connection
        .execute_batch("CREATE TABLE people (id BIGINT, title VARCHAR NOT NULL)")
        .unwrap();
    let pipeline = people_pipeline(ReplicationType::Full);
    let loader = Loader::new(&connection);

    loader
        .load(&people_batch(&[(1, "A"), (2, "B")]), &pipeline)
        .unwrap();

    // The truncate succeeds; the insert then violates NOT NULL.
    let batch = Batch::new(vec![
        Series::new("id", DataType::Int64, vec![Cell::I64(3)]).unwrap(),
        Series::from_strings("title", [None::<String>]),
    ])
    .unwrap();
    let err = loader.load(&batch, &pipeline).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    assert!(err.to_string().contains("people"), "{err}");
    assert_eq!(
        people_rows(&connection, PEOPLE_TABLE),
        people(&[(1, "A"), (2, "B")])
    );
    assert!(!table_exists(&connection, "staging"));
}

#[test]
fn staging_table_is_dropped_after_commit_test() {
    init_test_tracing();
    let connection = connection_with_people(ReplicationType::Append);

    Loader::new(&connection)
        .load(
            &people_batch(&[(1, "A")]),
            &people_pipeline(ReplicationType::Append),
        )
        .unwrap();

    assert!(!table_exists(&connection, "staging"));
}

#[test]
fn incremental_without_primary_keys_fails_before_writing_test() {
    init_test_tracing();
    let connection = connection_with_people(ReplicationType::Incremental);
    let mut pipeline = people_pipeline(ReplicationType::Incremental);
    pipeline.primary_keys.clear();

    let err = Loader::new(&connection)
        .load(&people_batch(&[(1, "A")]), &pipeline)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingPrimaryKeys);
    assert_eq!(count_rows(&connection, PEOPLE_TABLE), 0);
}

#[test]
fn pipeline_without_columns_loads_batch_columns_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    connection
        .execute_batch("CREATE TABLE loose (id BIGINT, title VARCHAR)")
        .unwrap();
    let pipeline = create_pipeline("loose", vec![], ReplicationType::Append, &[]);

    Loader::new(&connection)
        .load(&people_batch(&[(4, "D")]), &pipeline)
        .unwrap();

    assert_eq!(people_rows(&connection, "loose"), people(&[(4, "D")]));
}
