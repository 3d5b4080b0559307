//! Lenient column accessors over arrow record batches.
//!
//! Archives written by different tools disagree on physical types: values
//! arrive as floats or decimal text, timestamps as parquet timestamps,
//! integers or strings. Every accessor here normalises one column through
//! arrow's safe cast, so unparseable cells come back as `None` instead of
//! failing the batch.

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime, Utc};
use eyre::{eyre, Context, ContextCompat, Result};

/// Looks up a required column by name.
pub fn required<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .with_context(|| format!("column {name} not found in parquet schema"))
}

fn cast_to(column: &ArrayRef, name: &str, to: &DataType) -> Result<ArrayRef> {
    cast(column, to).wrap_err_with(|| {
        format!(
            "column {name} of type {} cannot be read as {to}",
            column.data_type()
        )
    })
}

/// Reads a column as unsigned integers; nulls and negative values become `None`.
pub fn u64_values(column: &ArrayRef, name: &str) -> Result<Vec<Option<u64>>> {
    let array = cast_to(column, name, &DataType::UInt64)?;
    let array = array
        .as_any()
        .downcast_ref::<UInt64Array>()
        .with_context(|| format!("{name} column is not u64 type"))?;
    Ok(array.iter().collect())
}

/// Reads a column as floats, coercing decimal text; invalid cells become `None`.
pub fn f64_values(column: &ArrayRef, name: &str) -> Result<Vec<Option<f64>>> {
    let array = cast_to(column, name, &DataType::Float64)?;
    let array = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .with_context(|| format!("{name} column is not f64 type"))?;
    Ok(array.iter().map(|v| v.filter(|f| !f.is_nan())).collect())
}

/// Reads a column as text. Accepts Utf8, LargeUtf8 and dictionary encoded strings.
pub fn string_values(column: &ArrayRef, name: &str) -> Result<Vec<Option<String>>> {
    let array = cast_to(column, name, &DataType::Utf8)?;
    let array = array
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("{name} column is not string type"))?;
    Ok(array.iter().map(|v| v.map(str::to_owned)).collect())
}

/// Reads a boolean flag column; nulls read as `false`.
pub fn bool_values(column: &ArrayRef, name: &str) -> Result<Vec<bool>> {
    let array = cast_to(column, name, &DataType::Boolean)?;
    let array = array
        .as_any()
        .downcast_ref::<BooleanArray>()
        .with_context(|| format!("{name} column is not bool type"))?;
    Ok(array.iter().map(|v| v.unwrap_or(false)).collect())
}

/// Reads a timestamp column.
///
/// Parquet timestamps of any unit are taken as UTC, bare integers as unix
/// milliseconds, and text through [`parse_timestamp`].
pub fn timestamp_values(column: &ArrayRef, name: &str) -> Result<Vec<Option<DateTime<Utc>>>> {
    match column.data_type() {
        DataType::Timestamp(unit, _) => {
            let per_ms = match unit {
                TimeUnit::Second => return scaled_timestamps(column, name, |v| v.checked_mul(1000)),
                TimeUnit::Millisecond => 1,
                TimeUnit::Microsecond => 1_000,
                TimeUnit::Nanosecond => 1_000_000,
            };
            scaled_timestamps(column, name, |v| Some(v.div_euclid(per_ms)))
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Dictionary(_, _) => {
            Ok(string_values(column, name)?
                .into_iter()
                .map(|v| v.as_deref().and_then(parse_timestamp))
                .collect())
        }
        dt if dt.is_integer() => scaled_timestamps(column, name, Some),
        other => Err(eyre!("{name} column has unsupported timestamp type {other}")),
    }
}

fn scaled_timestamps(
    column: &ArrayRef,
    name: &str,
    to_millis: impl Fn(i64) -> Option<i64>,
) -> Result<Vec<Option<DateTime<Utc>>>> {
    let array = cast_to(column, name, &DataType::Int64)?;
    let array = array
        .as_any()
        .downcast_ref::<Int64Array>()
        .with_context(|| format!("{name} column is not i64 type"))?;
    Ok(array
        .iter()
        .map(|v| v.and_then(&to_millis).and_then(DateTime::from_timestamp_millis))
        .collect())
}

/// Parses an RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` or unix-millisecond string.
///
/// Naive forms are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.and_utc());
        }
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}
