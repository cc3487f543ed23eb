//! Shared configuration types for duckflow pipelines.

mod base;
mod pipeline;
mod settings;

pub use base::ValidationError;
pub use pipeline::{
    Column, ColumnType, Datasource, Destination, PipelineDefinition, ReplicationType, Transform,
};
pub use settings::{
    CatalogSettings, ConnectionSettings, DEFAULT_CATALOG_NAME, REDACTED, StorageSettings,
};
