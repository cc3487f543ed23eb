use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use duckdb::types::{TimeUnit, Value};
use duckflow_config::shared::ColumnType;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Physical type of a [`crate::types::Series`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Utf8,
    Boolean,
    Int64,
    Float64,
    Date,
    Timestamp,
}

impl DataType {
    /// Short name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Utf8 => "str",
            DataType::Boolean => "bool",
            DataType::Int64 => "i64",
            DataType::Float64 => "f64",
            DataType::Date => "date",
            DataType::Timestamp => "datetime",
        }
    }

    /// Returns the DuckDB type used when staging a series of this type.
    pub fn sql_type(&self) -> &'static str {
        match self {
            DataType::Utf8 => "VARCHAR",
            DataType::Boolean => "BOOLEAN",
            DataType::Int64 => "BIGINT",
            DataType::Float64 => "DOUBLE",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
        }
    }
}

impl From<ColumnType> for DataType {
    fn from(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::String => DataType::Utf8,
            ColumnType::Integer | ColumnType::Long => DataType::Int64,
            ColumnType::Float | ColumnType::Double => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Date => DataType::Date,
            ColumnType::Timestamp => DataType::Timestamp,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single nullable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    String(String),
    I64(i64),
    F64(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// Returns the data type of the value, or `None` for [`Cell::Null`].
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Cell::Null => None,
            Cell::Bool(_) => Some(DataType::Boolean),
            Cell::String(_) => Some(DataType::Utf8),
            Cell::I64(_) => Some(DataType::Int64),
            Cell::F64(_) => Some(DataType::Float64),
            Cell::Date(_) => Some(DataType::Date),
            Cell::Timestamp(_) => Some(DataType::Timestamp),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the string slice when the cell holds a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(value) => Some(value),
            _ => None,
        }
    }

    /// Converts the cell into a DuckDB value for binding into a statement.
    pub fn to_duckdb_value(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Boolean(*b),
            Cell::String(s) => Value::Text(s.clone()),
            Cell::I64(i) => Value::BigInt(*i),
            Cell::F64(f) => Value::Double(*f),
            Cell::Date(d) => Value::Date32(d.signed_duration_since(epoch_date()).num_days() as i32),
            Cell::Timestamp(ts) => {
                Value::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
            }
        }
    }

    /// Converts a value read from DuckDB.
    ///
    /// Every integer width becomes [`Cell::I64`] and decimals become [`Cell::F64`].
    /// Types without a counterpart fail naming the column they were read from.
    pub fn from_duckdb_value(column: &str, value: Value) -> EtlResult<Cell> {
        let cell = match value {
            Value::Null => Cell::Null,
            Value::Boolean(b) => Cell::Bool(b),
            Value::TinyInt(i) => Cell::I64(i.into()),
            Value::SmallInt(i) => Cell::I64(i.into()),
            Value::Int(i) => Cell::I64(i.into()),
            Value::BigInt(i) => Cell::I64(i),
            Value::UTinyInt(i) => Cell::I64(i.into()),
            Value::USmallInt(i) => Cell::I64(i.into()),
            Value::UInt(i) => Cell::I64(i.into()),
            Value::UBigInt(i) => match i64::try_from(i) {
                Ok(i) => Cell::I64(i),
                Err(_) => bail!(
                    ErrorKind::SourceSchemaError,
                    "Integer value does not fit into i64",
                    format!("column '{column}', value {i}")
                ),
            },
            Value::HugeInt(i) => match i64::try_from(i) {
                Ok(i) => Cell::I64(i),
                Err(_) => bail!(
                    ErrorKind::SourceSchemaError,
                    "Integer value does not fit into i64",
                    format!("column '{column}', value {i}")
                ),
            },
            Value::Float(f) => Cell::F64(f.into()),
            Value::Double(f) => Cell::F64(f),
            Value::Decimal(d) => match d.to_string().parse::<f64>() {
                Ok(f) => Cell::F64(f),
                Err(_) => bail!(
                    ErrorKind::SourceSchemaError,
                    "Decimal value could not be converted to f64",
                    format!("column '{column}', value {d}")
                ),
            },
            Value::Text(s) | Value::Enum(s) => Cell::String(s),
            Value::Date32(days) => {
                match TimeDelta::try_days(days.into())
                    .and_then(|delta| epoch_date().checked_add_signed(delta))
                {
                    Some(date) => Cell::Date(date),
                    None => bail!(
                        ErrorKind::SourceSchemaError,
                        "Date value is out of range",
                        format!("column '{column}', value {days}")
                    ),
                }
            }
            Value::Timestamp(unit, value) => {
                let micros = match unit {
                    TimeUnit::Second => value.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => value.saturating_mul(1_000),
                    TimeUnit::Microsecond => value,
                    TimeUnit::Nanosecond => value / 1_000,
                };
                match DateTime::from_timestamp_micros(micros) {
                    Some(ts) => Cell::Timestamp(ts.naive_utc()),
                    None => bail!(
                        ErrorKind::SourceSchemaError,
                        "Timestamp value is out of range",
                        format!("column '{column}', value {value}")
                    ),
                }
            }
            other => bail!(
                ErrorKind::SourceSchemaError,
                "Unsupported column type in query result",
                format!("column '{column}', value {other:?}")
            ),
        };

        Ok(cell)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::String(s) => f.write_str(s),
            Cell::I64(i) => write!(f, "{i}"),
            Cell::F64(v) => write!(f, "{v}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

pub(crate) fn epoch_date() -> NaiveDate {
    NaiveDate::default()
}
