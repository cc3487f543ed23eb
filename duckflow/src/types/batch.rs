use std::collections::HashSet;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Cell, DataType};

/// A named, typed column of values.
///
/// Every non-null value matches the series' [`DataType`].
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    data_type: DataType,
    values: Vec<Cell>,
}

impl Series {
    /// Creates a series, failing if a non-null value does not match `data_type`.
    pub fn new(name: impl Into<String>, data_type: DataType, values: Vec<Cell>) -> EtlResult<Self> {
        let name = name.into();

        if let Some(value) = values
            .iter()
            .find(|value| value.data_type().is_some_and(|actual| actual != data_type))
        {
            bail!(
                ErrorKind::InvalidData,
                "Series value does not match the series type",
                format!("column '{name}' is {data_type}, found {value:?}")
            );
        }

        Ok(Self {
            name,
            data_type,
            values,
        })
    }

    /// Creates a series whose type is taken from its first non-null value.
    ///
    /// A series with only nulls is typed as [`DataType::Utf8`].
    pub fn infer(name: impl Into<String>, values: Vec<Cell>) -> EtlResult<Self> {
        let data_type = values
            .iter()
            .find_map(Cell::data_type)
            .unwrap_or(DataType::Utf8);

        Self::new(name, data_type, values)
    }

    /// Creates a string series, mapping `None` to null.
    pub fn from_strings<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            data_type: DataType::Utf8,
            values: values
                .into_iter()
                .map(|value| value.map_or(Cell::Null, |value| Cell::String(value.into())))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_null()).count()
    }

    /// Returns the series under a new name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// An ordered set of equally long series with unique names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    columns: Vec<Series>,
}

impl Batch {
    /// Creates a batch, failing on duplicate names or differing lengths.
    pub fn new(columns: Vec<Series>) -> EtlResult<Self> {
        let mut names = HashSet::with_capacity(columns.len());
        for series in &columns {
            if !names.insert(series.name()) {
                bail!(
                    ErrorKind::InvalidData,
                    "Batch contains duplicate column names",
                    series.name()
                );
            }
        }

        if let Some(first) = columns.first()
            && let Some(series) = columns.iter().find(|series| series.len() != first.len())
        {
            bail!(
                ErrorKind::InvalidData,
                "Batch columns differ in length",
                format!(
                    "column '{}' has {} rows, column '{}' has {}",
                    first.name(),
                    first.len(),
                    series.name(),
                    series.len()
                )
            );
        }

        Ok(Self { columns })
    }

    /// Returns a batch without columns or rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Series::len)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Returns the series with the given name.
    pub fn column(&self, name: &str) -> Option<&Series> {
        self.columns.iter().find(|series| series.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Series::name).collect()
    }

    pub fn columns(&self) -> &[Series] {
        &self.columns
    }

    /// Returns the values of one row in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Cell>> {
        if index >= self.num_rows() {
            return None;
        }

        Some(
            self.columns
                .iter()
                .map(|series| &series.values()[index])
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_rejects_values_of_another_type() {
        let err = Series::new("id", DataType::Int64, vec![Cell::I64(1), Cell::F64(2.0)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn infer_uses_the_first_non_null_value() {
        let series = Series::infer("price", vec![Cell::Null, Cell::F64(1.5)]).unwrap();
        assert_eq!(series.data_type(), DataType::Float64);
        assert_eq!(series.null_count(), 1);

        let series = Series::infer("empty", vec![Cell::Null]).unwrap();
        assert_eq!(series.data_type(), DataType::Utf8);
    }

    #[test]
    fn batch_rejects_duplicate_names() {
        let err = Batch::new(vec![
            Series::from_strings("a", [Some("x")]),
            Series::from_strings("a", [Some("y")]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains('a'));
    }

    #[test]
    fn batch_rejects_ragged_columns() {
        let err = Batch::new(vec![
            Series::from_strings("a", [Some("x"), Some("y")]),
            Series::from_strings("b", [Some("z")]),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn rows_follow_column_order() {
        let batch = Batch::new(vec![
            Series::from_strings("a", [Some("x"), None]),
            Series::new("b", DataType::Int64, vec![Cell::I64(1), Cell::I64(2)]).unwrap(),
        ])
        .unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.row(1), Some(vec![&Cell::Null, &Cell::I64(2)]));
        assert_eq!(batch.row(2), None);
        assert_eq!(Batch::empty().num_rows(), 0);
    }
}
