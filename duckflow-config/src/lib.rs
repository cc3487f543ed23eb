//! Configuration types and loading for duckflow pipelines.
//!
//! Pipeline definitions are read from YAML files, connection settings from
//! `DUCKLAKE_`-prefixed environment variables layered over optional
//! configuration files. Both are parsed once at the process boundary and then
//! passed by reference to the components that need them.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_pipeline, load_settings};
