//! Helpers shared by unit and integration tests.
//!
//! Everything here runs against an in-memory DuckDB database: [`fetcher`]
//! provides fetchers that serve prepared batches, [`pipeline`] builds pipeline
//! definitions and batches for a small `people` table and [`table`] reads
//! destination tables back for assertions.

pub mod fetcher;
pub mod pipeline;
pub mod table;
