//! SQL text issued against the connection.
//!
//! Identifiers go through [`quote_identifier`] and literals through
//! [`quote_literal`]; no other function interpolates user-supplied text.

use std::borrow::Cow;

/// Name of the connection-local relation holding the batch during a load.
pub const STAGING_TABLE: &str = "staging";

/// Quotes a table or column name when it is not a plain lowercase identifier.
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    pg_escape::quote_identifier(name)
}

/// Renders `value` as a single-quoted string literal.
pub fn quote_literal(value: &str) -> String {
    pg_escape::quote_literal(value)
}

/// Joins quoted identifiers with `, `.
pub fn identifier_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| quote_identifier(name.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn install_extension(name: &str, source: &str) -> String {
    format!("INSTALL {name} FROM {source};")
}

pub fn load_extension(name: &str) -> String {
    format!("LOAD {name};")
}

/// `SET s3_<key>='<value>';`
pub fn set_s3_option(key: &str, value: &str) -> String {
    format!("SET s3_{key}={};", quote_literal(value))
}

pub fn create_gcs_secret(name: &str, key_id: &str, secret: &str) -> String {
    format!(
        "CREATE OR REPLACE SECRET {} (TYPE gcs, KEY_ID {}, SECRET {});",
        quote_identifier(name),
        quote_literal(key_id),
        quote_literal(secret)
    )
}

/// Attaches a DuckLake catalog stored in Postgres.
pub fn attach_catalog(connection_string: &str, alias: &str, data_path: &str) -> String {
    format!(
        "ATTACH {} AS {} (DATA_PATH {});",
        quote_literal(&format!("ducklake:postgres:{connection_string}")),
        quote_identifier(alias),
        quote_literal(data_path)
    )
}

pub fn use_catalog(alias: &str) -> String {
    format!("USE {};", quote_identifier(alias))
}

/// `CREATE TABLE IF NOT EXISTS` with `(name, type)` column definitions.
pub fn create_table_if_not_exists(table: &str, columns: &[(&str, &str)]) -> String {
    let definitions = columns
        .iter()
        .map(|(name, sql_type)| format!("{} {sql_type}", quote_identifier(name)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({definitions})",
        quote_identifier(table)
    )
}

/// Creates the temporary staging table with `(name, type)` column definitions.
pub fn create_staging_table(columns: &[(&str, &str)]) -> String {
    let definitions = columns
        .iter()
        .map(|(name, sql_type)| format!("{} {sql_type}", quote_identifier(name)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE OR REPLACE TEMP TABLE {STAGING_TABLE} ({definitions})")
}

/// Parameterized insert of one row into the staging table.
pub fn insert_staging_row(column_count: usize) -> String {
    let placeholders = vec!["?"; column_count].join(", ");
    format!("INSERT INTO {STAGING_TABLE} VALUES ({placeholders})")
}

pub fn drop_staging_table() -> String {
    format!("DROP TABLE IF EXISTS temp.{STAGING_TABLE}")
}

pub fn truncate_table(table: &str) -> String {
    format!("TRUNCATE TABLE {}", quote_identifier(table))
}

pub fn insert_from_staging<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let columns = identifier_list(columns);
    format!(
        "INSERT INTO {} ({columns}) SELECT {columns} FROM {STAGING_TABLE}",
        quote_identifier(table)
    )
}

pub fn delete_matching_staging<S: AsRef<str>>(table: &str, primary_keys: &[S]) -> String {
    let keys = identifier_list(primary_keys);
    format!(
        "DELETE FROM {} WHERE ({keys}) IN (SELECT {keys} FROM {STAGING_TABLE})",
        quote_identifier(table)
    )
}

/// Counts the key values that occur more than once in the staging table.
pub fn count_duplicate_keys<S: AsRef<str>>(primary_keys: &[S]) -> String {
    let keys = identifier_list(primary_keys);
    format!(
        "SELECT COUNT(*) FROM (SELECT {keys} FROM {STAGING_TABLE} GROUP BY {keys} HAVING COUNT(*) > 1)"
    )
}
