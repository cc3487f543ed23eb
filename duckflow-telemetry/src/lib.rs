//! Logging setup shared by duckflow binaries and tests.

pub mod tracing;
