use duckdb::types::Value;

use crate::ducklake::{Connection, sql};
use crate::types::Cell;

/// Reads every row of `table` ordered by its first column.
pub fn table_rows(connection: &Connection, table: &str) -> Vec<Vec<Cell>> {
    query_rows(
        connection,
        &format!("SELECT * FROM {} ORDER BY 1", sql::quote_identifier(table)),
    )
}

/// Runs `query` and converts every value to a [`Cell`].
pub fn query_rows(connection: &Connection, query: &str) -> Vec<Vec<Cell>> {
    let mut statement = connection.raw().prepare(query).expect("query prepares");
    let mut rows = statement.query([]).expect("query runs");
    let width = rows
        .as_ref()
        .map(|statement| statement.column_count())
        .unwrap_or_default();

    let mut result = Vec::new();
    while let Some(row) = rows.next().expect("row is readable") {
        let cells = (0..width)
            .map(|index| {
                let value: Value = row.get(index).expect("value is readable");
                Cell::from_duckdb_value("test", value).expect("value converts")
            })
            .collect();
        result.push(cells);
    }

    result
}

/// Reads `(id, title)` pairs of a people table ordered by id.
pub fn people_rows(connection: &Connection, table: &str) -> Vec<(i64, String)> {
    table_rows(connection, table)
        .into_iter()
        .map(|row| match row.as_slice() {
            [Cell::I64(id), Cell::String(title)] => (*id, title.clone()),
            other => panic!("unexpected people row: {other:?}"),
        })
        .collect()
}

pub fn count_rows(connection: &Connection, table: &str) -> i64 {
    connection
        .raw()
        .query_row(
            &format!("SELECT COUNT(*) FROM {}", sql::quote_identifier(table)),
            [],
            |row| row.get(0),
        )
        .expect("table is countable")
}

/// Returns `true` if a table named `table` exists, temporary tables included.
pub fn table_exists(connection: &Connection, table: &str) -> bool {
    let count: i64 = connection
        .raw()
        .query_row(
            "SELECT COUNT(*) FROM duckdb_tables() WHERE table_name = ?",
            [table],
            |row| row.get(0),
        )
        .expect("table catalog is readable");

    count > 0
}
