use duckflow::ducklake::Connection;
use duckflow::error::ErrorKind;
use duckflow::runner::PipelineRunner;
use duckflow::test_utils::fetcher::{FailingFetcher, StaticFetcher};
use duckflow::test_utils::pipeline::{PEOPLE_TABLE, people_batch, people_pipeline};
use duckflow::test_utils::table::{count_rows, people_rows, table_exists};
use duckflow::types::{Batch, Series};
use duckflow_config::shared::{ColumnType, ReplicationType, Transform};
use duckflow_telemetry::tracing::init_test_tracing;

#[test]
fn runner_transforms_and_loads_fetched_rows_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    let mut pipeline = people_pipeline(ReplicationType::Incremental);
    pipeline.columns[0].transforms = vec![Transform::Cast {
        target_type: ColumnType::Long,
    }];
    pipeline.columns[1].transforms = vec![Transform::Trim, Transform::Upper];

    let fetched = Batch::new(vec![
        Series::from_strings("id", [Some("1"), Some("2")]),
        Series::from_strings("title", [Some("  ada "), Some("grace")]),
        Series::from_strings("ignored", [Some("x"), Some("y")]),
    ])
    .unwrap();
    let fetcher = StaticFetcher::new(fetched);

    let outcome = PipelineRunner::new(&connection)
        .run_with(&pipeline, &fetcher)
        .unwrap();

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(outcome.inserted, 2);
    assert_eq!(
        people_rows(&connection, PEOPLE_TABLE),
        vec![(1, "ADA".to_owned()), (2, "GRACE".to_owned())]
    );
}

#[test]
fn runner_without_transforms_loads_batch_as_is_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    let pipeline = people_pipeline(ReplicationType::Append);
    let fetcher = StaticFetcher::new(people_batch(&[(1, "A")]));
    let runner = PipelineRunner::new(&connection);

    runner.run_with(&pipeline, &fetcher).unwrap();
    runner.run_with(&pipeline, &fetcher).unwrap();

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(count_rows(&connection, PEOPLE_TABLE), 2);
}

#[test]
fn runner_propagates_fetch_failures_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    let pipeline = people_pipeline(ReplicationType::Full);

    let err = PipelineRunner::new(&connection)
        .run_with(&pipeline, &FailingFetcher)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceIoError);
    // Schema sync runs before the fetch.
    assert!(table_exists(&connection, PEOPLE_TABLE));
    assert_eq!(count_rows(&connection, PEOPLE_TABLE), 0);
}

#[test]
fn runner_propagates_transform_failures_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    let mut pipeline = people_pipeline(ReplicationType::Full);
    pipeline.columns[0].transforms = vec![Transform::Cast {
        target_type: ColumnType::Long,
    }];
    let fetcher = StaticFetcher::new(
        Batch::new(vec![
            Series::from_strings("id", [Some("1"), Some("two")]),
            Series::from_strings("title", [Some("A"), Some("B")]),
        ])
        .unwrap(),
    );

    let err = PipelineRunner::new(&connection)
        .run_with(&pipeline, &fetcher)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionError);
    assert!(err.to_string().contains("\"two\""), "{err}");
    assert_eq!(count_rows(&connection, PEOPLE_TABLE), 0);
}
