use duckflow_config::shared::{Column, Transform};
use regex::Regex;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::transform::ops;
use crate::types::{Batch, DataType, Series};

/// One compiled step of a [`ColumnExpr`].
#[derive(Debug, Clone)]
enum Step {
    Cast(DataType),
    Trim,
    Upper,
    Lower,
    RegexReplace { regex: Regex, replacement: String },
    Split { delimiter: String, index: i64 },
    Substring { start: i64, length: Option<usize> },
    DateFormat { format: String },
}

/// A column reference followed by an ordered list of operations.
///
/// Steps compile when they are appended, so an invalid regex fails before any
/// value is read.
#[derive(Debug, Clone)]
pub struct ColumnExpr {
    column: String,
    alias: String,
    steps: Vec<Step>,
}

impl ColumnExpr {
    /// References a column of the input batch by name.
    pub fn column(name: impl Into<String>) -> Self {
        let column = name.into();
        Self {
            alias: column.clone(),
            column,
            steps: Vec::new(),
        }
    }

    /// Builds the expression for a declared column, folding its transforms left to right.
    pub fn for_column(column: &Column) -> EtlResult<Self> {
        column
            .transforms
            .iter()
            .try_fold(Self::column(&column.name), |expr, transform| {
                expr.then(transform)
            })
            .map(|expr| expr.alias(&column.name))
    }

    /// Names the output series.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.alias = name.into();
        self
    }

    /// Appends a transform to the expression.
    pub fn then(mut self, transform: &Transform) -> EtlResult<Self> {
        let step = match transform {
            Transform::Cast { target_type } => Step::Cast((*target_type).into()),
            Transform::Trim => Step::Trim,
            Transform::Upper => Step::Upper,
            Transform::Lower => Step::Lower,
            Transform::RegexReplace {
                pattern,
                replacement,
            } => match Regex::new(pattern) {
                Ok(regex) => Step::RegexReplace {
                    regex,
                    replacement: replacement.clone(),
                },
                Err(err) => bail!(
                    ErrorKind::InvalidTransform,
                    "Invalid regular expression",
                    format!("pattern `{pattern}` in column '{}'", self.column),
                    source: err
                ),
            },
            Transform::Split { delimiter, index } => Step::Split {
                delimiter: delimiter.clone(),
                index: *index,
            },
            Transform::Substring { start, length } => Step::Substring {
                start: *start,
                length: *length,
            },
            Transform::DateFormat { input_format } => Step::DateFormat {
                format: input_format.clone(),
            },
        };

        self.steps.push(step);
        Ok(self)
    }

    /// Name of the referenced input column.
    pub fn source_column(&self) -> &str {
        &self.column
    }

    /// Name of the output series.
    pub fn output_name(&self) -> &str {
        &self.alias
    }

    /// Evaluates the expression against `batch`.
    ///
    /// Fails with [`ErrorKind::MissingColumn`] when the referenced column is absent.
    pub fn evaluate(&self, batch: &Batch) -> EtlResult<Series> {
        let Some(input) = batch.column(&self.column) else {
            bail!(
                ErrorKind::MissingColumn,
                "Column not found in batch",
                self.column.clone()
            );
        };

        let series = self
            .steps
            .iter()
            .try_fold(input.clone(), |series, step| apply(step, series))?;

        Ok(series.with_name(self.alias.clone()))
    }
}

fn apply(step: &Step, series: Series) -> EtlResult<Series> {
    match step {
        Step::Cast(target) => ops::cast(series, *target),
        Step::Trim => ops::trim(series),
        Step::Upper => ops::upper(series),
        Step::Lower => ops::lower(series),
        Step::RegexReplace { regex, replacement } => ops::regex_replace(series, regex, replacement),
        Step::Split { delimiter, index } => ops::split(series, delimiter, *index),
        Step::Substring { start, length } => ops::substring(series, *start, *length),
        Step::DateFormat { format } => ops::date_format(series, format),
    }
}
