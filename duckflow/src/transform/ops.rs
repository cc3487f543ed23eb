//! Column-wide operations the transform expressions are built from.
//!
//! Every operation maps one [`Series`] to a new series of the same length and
//! name. Nulls pass through unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::types::{Cell, DataType, Series, epoch_date};

/// Maximum number of failing values quoted in a conversion error.
const MAX_FAILURE_SAMPLES: usize = 10;

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Casts every value to `target`.
///
/// Fails if any non-null value cannot be represented in the target type; the
/// error names the column, both types and how many values failed.
pub fn cast(series: Series, target: DataType) -> EtlResult<Series> {
    let source = series.data_type();
    if source == target {
        return Ok(series);
    }

    let name = series.name().to_owned();
    let total = series.len();
    let mut failures = Vec::new();

    let values = series
        .into_values()
        .into_iter()
        .map(|value| match cast_cell(&value, target) {
            Some(cast) => cast,
            None => {
                failures.push(value);
                Cell::Null
            }
        })
        .collect();

    if !failures.is_empty() {
        return Err(conversion_error(
            source.as_str(),
            target.as_str(),
            &name,
            &failures,
            total,
        ));
    }

    Series::new(name, target, values)
}

fn cast_cell(value: &Cell, target: DataType) -> Option<Cell> {
    let cast = match (value, target) {
        (Cell::Null, _) => Cell::Null,
        (value, DataType::Utf8) => Cell::String(value.to_string()),

        (Cell::I64(i), DataType::Int64) => Cell::I64(*i),
        (Cell::F64(f), DataType::Int64) => {
            let truncated = f.trunc();
            if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated > i64::MAX as f64
            {
                return None;
            }
            Cell::I64(truncated as i64)
        }
        (Cell::Bool(b), DataType::Int64) => Cell::I64(i64::from(*b)),
        (Cell::String(s), DataType::Int64) => Cell::I64(s.parse().ok()?),
        (Cell::Date(d), DataType::Int64) => Cell::I64(d.signed_duration_since(epoch_date()).num_days()),
        (Cell::Timestamp(ts), DataType::Int64) => Cell::I64(ts.and_utc().timestamp_micros()),

        (Cell::F64(f), DataType::Float64) => Cell::F64(*f),
        (Cell::I64(i), DataType::Float64) => Cell::F64(*i as f64),
        (Cell::Bool(b), DataType::Float64) => Cell::F64(if *b { 1.0 } else { 0.0 }),
        (Cell::String(s), DataType::Float64) => Cell::F64(s.parse().ok()?),

        (Cell::Bool(b), DataType::Boolean) => Cell::Bool(*b),
        (Cell::I64(i), DataType::Boolean) => Cell::Bool(*i != 0),
        (Cell::F64(f), DataType::Boolean) => Cell::Bool(*f != 0.0),
        (Cell::String(s), DataType::Boolean) => Cell::Bool(parse_bool(s)?),

        (Cell::Date(d), DataType::Date) => Cell::Date(*d),
        (Cell::Timestamp(ts), DataType::Date) => Cell::Date(ts.date()),
        (Cell::I64(days), DataType::Date) => {
            Cell::Date(epoch_date().checked_add_signed(chrono::Duration::try_days(*days)?)?)
        }
        (Cell::String(s), DataType::Date) => {
            Cell::Date(NaiveDate::parse_from_str(s, DATE_FORMAT).ok()?)
        }

        (Cell::Timestamp(ts), DataType::Timestamp) => Cell::Timestamp(*ts),
        (Cell::Date(d), DataType::Timestamp) => Cell::Timestamp(d.and_time(NaiveTime::MIN)),
        (Cell::I64(micros), DataType::Timestamp) => {
            Cell::Timestamp(DateTime::from_timestamp_micros(*micros)?.naive_utc())
        }
        (Cell::String(s), DataType::Timestamp) => Cell::Timestamp(parse_timestamp(s)?),

        _ => return None,
    };

    Some(cast)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Removes leading and trailing whitespace.
pub fn trim(series: Series) -> EtlResult<Series> {
    map_strings(series, "trim", |value| Some(Cell::String(value.trim().to_owned())))
}

pub fn upper(series: Series) -> EtlResult<Series> {
    map_strings(series, "upper", |value| Some(Cell::String(value.to_uppercase())))
}

pub fn lower(series: Series) -> EtlResult<Series> {
    map_strings(series, "lower", |value| Some(Cell::String(value.to_lowercase())))
}

/// Replaces every non-overlapping match of `regex` with `replacement`.
///
/// `replacement` may reference capture groups as `$1` or `${name}`.
pub fn regex_replace(series: Series, regex: &Regex, replacement: &str) -> EtlResult<Series> {
    map_strings(series, "regex_replace", |value| {
        Some(Cell::String(regex.replace_all(value, replacement).into_owned()))
    })
}

/// Splits on `delimiter` and keeps the part at `index`.
///
/// An empty delimiter splits into characters. A negative index counts from the
/// end and an out-of-bounds index yields null.
pub fn split(series: Series, delimiter: &str, index: i64) -> EtlResult<Series> {
    map_strings(series, "split", |value| {
        let parts: Vec<&str> = if delimiter.is_empty() {
            value
                .char_indices()
                .map(|(start, c)| &value[start..start + c.len_utf8()])
                .collect()
        } else {
            value.split(delimiter).collect()
        };

        let position = resolve_index(index, parts.len())?;
        Some(Cell::String(parts[position].to_owned()))
    })
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let position = if index < 0 { len + index } else { index };

    if (0..len).contains(&position) {
        usize::try_from(position).ok()
    } else {
        None
    }
}

/// Takes `length` characters starting at `start`.
///
/// A negative start counts from the end. Slices reaching past either end are
/// clamped, so an out-of-range slice yields an empty string.
pub fn substring(series: Series, start: i64, length: Option<usize>) -> EtlResult<Series> {
    map_strings(series, "substring", |value| {
        let chars: Vec<char> = value.chars().collect();
        let count = chars.len() as i64;

        let from = (if start < 0 {
            (count + start).max(0)
        } else {
            start.min(count)
        }) as usize;
        let to = match length {
            Some(length) => from.saturating_add(length).min(chars.len()),
            None => chars.len(),
        };

        Some(Cell::String(chars[from..to].iter().collect()))
    })
}

/// Parses strings into timestamps with a `strftime`-style `format`.
///
/// Formats without a time component produce midnight of the parsed date.
/// Unparsable values fail the whole column.
pub fn date_format(series: Series, format: &str) -> EtlResult<Series> {
    ensure_strings(&series, "date_format")?;

    let name = series.name().to_owned();
    let total = series.len();
    let mut failures = Vec::new();

    let values = series
        .into_values()
        .into_iter()
        .map(|value| {
            let Cell::String(raw) = &value else {
                return Cell::Null;
            };

            match parse_with_format(raw, format) {
                Some(ts) => Cell::Timestamp(ts),
                None => {
                    failures.push(value);
                    Cell::Null
                }
            }
        })
        .collect();

    if !failures.is_empty() {
        bail!(
            ErrorKind::ConversionError,
            "Date parsing failed",
            format!(
                "parsing column '{name}' with format `{format}` failed for {} out of {total} values: [{}]",
                failures.len(),
                failure_sample(&failures)
            )
        );
    }

    Series::new(name, DataType::Timestamp, values)
}

fn parse_with_format(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format).ok().or_else(|| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN))
    })
}

/// Applies `op` to every non-null string; `None` from `op` yields null.
fn map_strings<F>(series: Series, operation: &str, op: F) -> EtlResult<Series>
where
    F: Fn(&str) -> Option<Cell>,
{
    ensure_strings(&series, operation)?;

    let name = series.name().to_owned();
    let values = series
        .into_values()
        .into_iter()
        .map(|value| match value {
            Cell::String(raw) => op(&raw).unwrap_or(Cell::Null),
            other => other,
        })
        .collect();

    Series::new(name, DataType::Utf8, values)
}

fn ensure_strings(series: &Series, operation: &str) -> EtlResult<()> {
    if series.data_type() != DataType::Utf8 {
        bail!(
            ErrorKind::InvalidData,
            "String operation applied to a non-string column",
            format!(
                "`{operation}` expects a str column, column '{}' is {}",
                series.name(),
                series.data_type()
            )
        );
    }

    Ok(())
}

fn conversion_error(
    source: &str,
    target: &str,
    column: &str,
    failures: &[Cell],
    total: usize,
) -> EtlError {
    etl_error!(
        ErrorKind::ConversionError,
        "Column conversion failed",
        format!(
            "conversion from `{source}` to `{target}` failed in column '{column}' for {} out of {total} values: [{}]",
            failures.len(),
            failure_sample(failures)
        )
    )
}

fn failure_sample(failures: &[Cell]) -> String {
    failures
        .iter()
        .take(MAX_FAILURE_SAMPLES)
        .map(|value| match value {
            Cell::String(s) => format!("{s:?}"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[Option<&str>]) -> Series {
        Series::from_strings("col", values.iter().copied())
    }

    fn string_values(series: &Series) -> Vec<Option<&str>> {
        series.values().iter().map(Cell::as_str).collect()
    }

    #[test]
    fn cast_parses_numbers_and_keeps_nulls() {
        let series = cast(strings(&[Some("1"), None, Some("-3")]), DataType::Int64).unwrap();
        assert_eq!(series.data_type(), DataType::Int64);
        assert_eq!(series.values(), &[Cell::I64(1), Cell::Null, Cell::I64(-3)]);

        let series = cast(strings(&[Some("1.25")]), DataType::Float64).unwrap();
        assert_eq!(series.values(), &[Cell::F64(1.25)]);
    }

    #[test]
    fn cast_failure_reports_column_types_and_count() {
        let err = cast(strings(&[Some("1"), Some("x"), Some("y")]), DataType::Int64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
        let message = err.to_string();
        assert!(message.contains("from `str` to `i64`"), "{message}");
        assert!(message.contains("column 'col'"), "{message}");
        assert!(message.contains("2 out of 3 values"), "{message}");
        assert!(message.contains("[\"x\", \"y\"]"), "{message}");
    }

    #[test]
    fn cast_float_to_integer_truncates() {
        let series = Series::new("n", DataType::Float64, vec![Cell::F64(2.9), Cell::F64(-2.9)])
            .unwrap();
        let series = cast(series, DataType::Int64).unwrap();
        assert_eq!(series.values(), &[Cell::I64(2), Cell::I64(-2)]);
    }

    #[test]
    fn cast_to_string_uses_display_form() {
        let series = Series::new("n", DataType::Int64, vec![Cell::I64(42)]).unwrap();
        let series = cast(series, DataType::Utf8).unwrap();
        assert_eq!(string_values(&series), vec![Some("42")]);
    }

    #[test]
    fn cast_parses_booleans_and_dates() {
        let series = cast(strings(&[Some("TRUE"), Some("0")]), DataType::Boolean).unwrap();
        assert_eq!(series.values(), &[Cell::Bool(true), Cell::Bool(false)]);

        let series = cast(strings(&[Some("2024-02-29")]), DataType::Date).unwrap();
        assert_eq!(
            series.values(),
            &[Cell::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())]
        );

        let series = cast(strings(&[Some("2024-02-29")]), DataType::Timestamp).unwrap();
        assert_eq!(
            series.values(),
            &[Cell::Timestamp(
                NaiveDate::from_ymd_opt(2024, 2, 29)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )]
        );
    }

    #[test]
    fn string_operations() {
        let series = trim(strings(&[Some("  a b  "), None])).unwrap();
        assert_eq!(string_values(&series), vec![Some("a b"), None]);

        let series = upper(strings(&[Some("abc")])).unwrap();
        assert_eq!(string_values(&series), vec![Some("ABC")]);

        let series = lower(strings(&[Some("AbC")])).unwrap();
        assert_eq!(string_values(&series), vec![Some("abc")]);
    }

    #[test]
    fn string_operations_reject_other_types() {
        let series = Series::new("n", DataType::Int64, vec![Cell::I64(1)]).unwrap();
        let err = upper(series).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.to_string().contains("`upper`"));
        assert!(err.to_string().contains("'n' is i64"));
    }

    #[test]
    fn regex_replace_replaces_every_match() {
        let regex = Regex::new(r"(\$|,)").unwrap();
        let series = regex_replace(strings(&[Some("$1,234.50")]), &regex, "").unwrap();
        assert_eq!(string_values(&series), vec![Some("1234.50")]);

        let regex = Regex::new(r"(\w+)@(\w+)").unwrap();
        let series = regex_replace(strings(&[Some("me@home")]), &regex, "$2:$1").unwrap();
        assert_eq!(string_values(&series), vec![Some("home:me")]);
    }

    #[test]
    fn split_picks_parts_and_nulls_out_of_bounds() {
        let series = split(strings(&[Some("a,b")]), ",", 1).unwrap();
        assert_eq!(string_values(&series), vec![Some("b")]);

        let series = split(strings(&[Some("a,b")]), ",", 5).unwrap();
        assert_eq!(series.values(), &[Cell::Null]);

        let series = split(strings(&[Some("a,b,c")]), ",", -1).unwrap();
        assert_eq!(string_values(&series), vec![Some("c")]);

        let series = split(strings(&[Some("xyz")]), "", 1).unwrap();
        assert_eq!(string_values(&series), vec![Some("y")]);
    }

    #[test]
    fn substring_clamps_out_of_range_slices() {
        let series = substring(strings(&[Some("abcdef")]), 2, Some(3)).unwrap();
        assert_eq!(string_values(&series), vec![Some("cde")]);

        let series = substring(strings(&[Some("abcdef")]), 4, None).unwrap();
        assert_eq!(string_values(&series), vec![Some("ef")]);

        let series = substring(strings(&[Some("abc")]), 10, Some(2)).unwrap();
        assert_eq!(string_values(&series), vec![Some("")]);

        let series = substring(strings(&[Some("abcdef")]), -2, None).unwrap();
        assert_eq!(string_values(&series), vec![Some("ef")]);
    }

    #[test]
    fn date_format_parses_dates_and_datetimes() {
        let series = date_format(strings(&[Some("03/01/2024"), None]), "%d/%m/%Y").unwrap();
        assert_eq!(series.data_type(), DataType::Timestamp);
        assert_eq!(
            series.values(),
            &[
                Cell::Timestamp(
                    NaiveDate::from_ymd_opt(2024, 1, 3)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap()
                ),
                Cell::Null
            ]
        );

        let series = date_format(strings(&[Some("2024-01-03 10:30")]), "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(
            series.values(),
            &[Cell::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 3)
                    .unwrap()
                    .and_hms_opt(10, 30, 0)
                    .unwrap()
            )]
        );
    }

    #[test]
    fn date_format_fails_on_unparsable_values() {
        let err = date_format(strings(&[Some("not a date")]), "%Y-%m-%d").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
        assert!(err.to_string().contains("`%Y-%m-%d`"));
        assert!(err.to_string().contains("\"not a date\""));
    }
}
