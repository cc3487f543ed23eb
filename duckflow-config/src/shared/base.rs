use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The pipeline has no name, so there is no destination table to write to.
    #[error("pipeline `name` cannot be empty")]
    EmptyPipelineName,
    /// A declared column has an empty name.
    #[error("column names cannot be empty")]
    EmptyColumnName,
    /// The same column name is declared twice.
    #[error("column `{0}` is declared more than once")]
    DuplicateColumn(String),
    /// A primary key does not name a declared column.
    #[error("primary key `{0}` is not a declared column")]
    UnknownPrimaryKey(String),
    /// Incremental replication without primary keys.
    #[error("`primary_keys` must not be empty when replication is `incremental`")]
    MissingPrimaryKeys,
    /// The replication value is not one of `full`, `append` or `incremental`.
    #[error("unknown replication strategy: `{0}`")]
    UnknownReplicationStrategy(String),
    /// The transform `type` is not a known transform identifier.
    #[error("unknown transform type: `{0}`")]
    UnknownTransform(String),
    /// The transform `params` do not match the transform type.
    #[error("invalid params for transform `{transform}`: {source}")]
    InvalidTransformParams {
        transform: String,
        #[source]
        source: serde_json::Error,
    },
}
