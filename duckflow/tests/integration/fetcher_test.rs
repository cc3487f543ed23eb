use duckflow::ducklake::Connection;
use duckflow::error::ErrorKind;
use duckflow::fetch::{DuckLakeFetcher, Fetcher, create_fetcher};
use duckflow::test_utils::pipeline::{create_pipeline, people_pipeline};
use duckflow::types::{Cell, DataType};
use duckflow_config::shared::{Datasource, ReplicationType};
use duckflow_telemetry::tracing::init_test_tracing;

fn source_connection() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    connection
        .execute_batch(
            "CREATE TABLE quotes (symbol VARCHAR, price DOUBLE, volume BIGINT, day DATE);
             INSERT INTO quotes VALUES
                ('AAPL', 185.64, 82488700, DATE '2024-01-02'),
                ('MSFT', 370.87, NULL, DATE '2024-01-02');",
        )
        .unwrap();
    connection
}

#[test]
fn ducklake_fetcher_infers_column_types_test() {
    init_test_tracing();
    let connection = source_connection();
    let pipeline = people_pipeline(ReplicationType::Full);

    let batch = DuckLakeFetcher::new(
        &connection,
        "SELECT * FROM quotes ORDER BY symbol".to_owned(),
    )
    .fetch(&pipeline)
    .unwrap();

    assert_eq!(batch.column_names(), vec!["symbol", "price", "volume", "day"]);
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.column("price").unwrap().data_type(), DataType::Float64);
    assert_eq!(batch.column("volume").unwrap().data_type(), DataType::Int64);
    assert_eq!(batch.column("day").unwrap().data_type(), DataType::Date);
    assert_eq!(batch.column("volume").unwrap().values()[1], Cell::Null);
}

#[test]
fn ducklake_fetcher_reports_the_failing_query_test() {
    init_test_tracing();
    let connection = source_connection();

    let err = DuckLakeFetcher::new(&connection, "SELECT * FROM missing".to_owned())
        .fetch(&people_pipeline(ReplicationType::Full))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    assert!(err.to_string().contains("SELECT * FROM missing"));
}

#[test]
fn create_fetcher_serves_ducklake_queries_test() {
    init_test_tracing();
    let connection = source_connection();
    let mut pipeline = create_pipeline("copy", vec![], ReplicationType::Full, &[]);
    pipeline.datasource = Datasource::DuckLake {
        query: "SELECT symbol FROM quotes".to_owned(),
    };

    let fetcher = create_fetcher(&pipeline, &connection, std::path::Path::new(".")).unwrap();
    let batch = fetcher.fetch(&pipeline).unwrap();

    assert_eq!(batch.num_rows(), 2);
}

#[test]
fn create_fetcher_requires_sheet_credentials_test() {
    init_test_tracing();
    let connection = Connection::open_in_memory().unwrap();
    let secrets = tempfile::tempdir().unwrap();
    let mut pipeline = create_pipeline("sheet", vec![], ReplicationType::Full, &[]);
    pipeline.datasource = Datasource::GoogleSheet {
        sheet_id: "sheet".to_owned(),
        sheet_range: "A1:C".to_owned(),
        credentials_file: "google.json".to_owned(),
    };

    let err = create_fetcher(&pipeline, &connection, secrets.path())
        .map(|_| ())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(err.to_string().contains("google.json"), "{err}");
}
