//! Configuration-driven ETL into a DuckLake catalog.
//!
//! A run provisions one DuckDB connection attached to a remote catalog, makes
//! sure the destination table exists, fetches a single columnar [`types::Batch`],
//! reshapes its columns with the [`transform`] engine and loads it inside one
//! transaction using the pipeline's replication policy.

pub mod ducklake;
pub mod error;
pub mod fetch;
mod macros;
pub mod runner;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;
