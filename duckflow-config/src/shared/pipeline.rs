use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Column type in the pipeline vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    Timestamp,
}

impl ColumnType {
    /// Returns the identifier used for this type in pipeline files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Long => "long",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single column-level transform.
///
/// Parsed from `{type: <id>, params: {...}}`. Each variant carries only the
/// parameters it needs; omitted optional parameters take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawTransform")]
pub enum Transform {
    Cast {
        target_type: ColumnType,
    },
    Trim,
    Upper,
    Lower,
    RegexReplace {
        pattern: String,
        replacement: String,
    },
    Split {
        delimiter: String,
        index: i64,
    },
    Substring {
        start: i64,
        length: Option<usize>,
    },
    DateFormat {
        input_format: String,
    },
}

impl Transform {
    /// Returns the identifier used for this transform in pipeline files.
    pub fn kind(&self) -> &'static str {
        match self {
            Transform::Cast { .. } => "cast",
            Transform::Trim => "trim",
            Transform::Upper => "upper",
            Transform::Lower => "lower",
            Transform::RegexReplace { .. } => "regex_replace",
            Transform::Split { .. } => "split",
            Transform::Substring { .. } => "substring",
            Transform::DateFormat { .. } => "date_format",
        }
    }
}

#[derive(Deserialize)]
struct RawTransform {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    params: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CastParams {
    target_type: ColumnType,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegexReplaceParams {
    pattern: String,
    #[serde(default)]
    replacement: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SplitParams {
    delimiter: String,
    #[serde(default)]
    index: i64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SubstringParams {
    #[serde(default)]
    start: i64,
    #[serde(default)]
    length: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DateFormatParams {
    input_format: String,
}

fn parse_params<T: DeserializeOwned>(
    kind: &str,
    params: serde_json::Value,
) -> Result<T, ValidationError> {
    serde_json::from_value(params).map_err(|source| ValidationError::InvalidTransformParams {
        transform: kind.to_owned(),
        source,
    })
}

impl TryFrom<RawTransform> for Transform {
    type Error = ValidationError;

    fn try_from(raw: RawTransform) -> Result<Self, Self::Error> {
        let params = match raw.params {
            None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
            Some(params) => params,
        };
        let kind = raw.kind.as_str();

        let transform = match kind {
            "cast" => {
                let CastParams { target_type } = parse_params(kind, params)?;
                Transform::Cast { target_type }
            }
            "trim" => Transform::Trim,
            "upper" => Transform::Upper,
            "lower" => Transform::Lower,
            "regex_replace" => {
                let RegexReplaceParams {
                    pattern,
                    replacement,
                } = parse_params(kind, params)?;
                Transform::RegexReplace {
                    pattern,
                    replacement,
                }
            }
            "split" => {
                let SplitParams { delimiter, index } = parse_params(kind, params)?;
                Transform::Split { delimiter, index }
            }
            "substring" => {
                let SubstringParams { start, length } = parse_params(kind, params)?;
                Transform::Substring { start, length }
            }
            "date_format" => {
                let DateFormatParams { input_format } = parse_params(kind, params)?;
                Transform::DateFormat { input_format }
            }
            other => return Err(ValidationError::UnknownTransform(other.to_owned())),
        };

        Ok(transform)
    }
}

/// A declared destination column and the transforms producing it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Applied left to right.
    #[serde(default)]
    pub transforms: Vec<Transform>,
}

impl Column {
    /// Creates a column without transforms.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            transforms: Vec::new(),
        }
    }

    /// Returns the column with the given transforms.
    pub fn with_transforms(mut self, transforms: Vec<Transform>) -> Self {
        self.transforms = transforms;
        self
    }
}

/// How an incoming batch is merged into the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ReplicationType {
    Full,
    Append,
    Incremental,
}

impl ReplicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationType::Full => "full",
            ReplicationType::Append => "append",
            ReplicationType::Incremental => "incremental",
        }
    }
}

impl fmt::Display for ReplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplicationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(ReplicationType::Full),
            "append" => Ok(ReplicationType::Append),
            "incremental" => Ok(ReplicationType::Incremental),
            other => Err(ValidationError::UnknownReplicationStrategy(other.to_owned())),
        }
    }
}

impl TryFrom<String> for ReplicationType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Where the pipeline reads its rows from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Datasource {
    /// A range of a Google spreadsheet, read as strings.
    #[serde(rename = "gsheet")]
    GoogleSheet {
        sheet_id: String,
        sheet_range: String,
        /// Credentials file name, relative to the secrets directory.
        credentials_file: String,
    },
    /// A query against the provisioned connection.
    #[serde(rename = "ducklake")]
    DuckLake { query: String },
    /// Daily price history of a ticker symbol.
    #[serde(rename = "yfinance")]
    YFinance {
        symbol: String,
        #[serde(default = "default_period")]
        period: String,
        #[serde(default = "default_interval")]
        interval: String,
    },
}

fn default_period() -> String {
    "1mo".to_owned()
}

fn default_interval() -> String {
    "1d".to_owned()
}

impl Datasource {
    /// Returns the identifier used for this datasource in pipeline files.
    pub fn kind(&self) -> &'static str {
        match self {
            Datasource::GoogleSheet { .. } => "gsheet",
            Datasource::DuckLake { .. } => "ducklake",
            Datasource::YFinance { .. } => "yfinance",
        }
    }
}

/// Where the pipeline writes its rows to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Destination {
    /// A table in the attached catalog. Defaults to a table named after the pipeline.
    #[serde(rename = "ducklake")]
    DuckLake {
        #[serde(default)]
        table: Option<String>,
    },
}

/// One ETL job: where rows come from, how columns are shaped, and how they land.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    pub replication: ReplicationType,
    pub datasource: Datasource,
    #[serde(default)]
    pub destination: Option<Destination>,
}

impl PipelineDefinition {
    /// Returns the declared column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Returns `true` if at least one column declares a transform.
    pub fn has_transforms(&self) -> bool {
        self.columns.iter().any(|column| !column.transforms.is_empty())
    }

    /// Returns the destination table name.
    pub fn destination_table(&self) -> &str {
        match &self.destination {
            Some(Destination::DuckLake { table: Some(table) }) => table,
            Some(Destination::DuckLake { table: None }) | None => &self.name,
        }
    }

    /// Checks the invariants that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyPipelineName);
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(ValidationError::EmptyColumnName);
            }
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.name.clone()));
            }
        }

        if let Some(key) = self
            .primary_keys
            .iter()
            .find(|key| !seen.contains(key.as_str()))
        {
            return Err(ValidationError::UnknownPrimaryKey(key.clone()));
        }

        if self.replication == ReplicationType::Incremental && self.primary_keys.is_empty() {
            return Err(ValidationError::MissingPrimaryKeys);
        }

        Ok(())
    }
}
