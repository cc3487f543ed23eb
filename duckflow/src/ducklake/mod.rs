//! DuckDB connection, DuckLake provisioning and the load path.

mod connection;
mod loader;
pub mod provision;
pub mod replication;
mod schema;
pub mod sql;

pub use connection::Connection;
pub use loader::Loader;
pub use provision::{ConnectionProvisioner, StorageBackend, provision};
pub use replication::{ReplicationOutcome, ReplicationStrategy};
pub use schema::{SchemaSyncer, build_create_table_sql, column_sql_type};
