//! Typed cell values established once at the engine boundary.
//!
//! Query results arrive as Arrow arrays of whatever type the engine chose.
//! [`column_values`] normalizes a whole column into [`CellValue`]s so that the
//! statistical code never switches on Arrow types.

use std::fmt;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMicrosecondType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single dynamically-typed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    /// Returns true for [`CellValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the cell. Text is parsed when it looks numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Null | Self::Timestamp(_) => None,
        }
    }

    /// Integer view of the cell, truncating floats.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(*v as i64),
            Self::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Timestamp view of the cell. RFC 3339 and `YYYY-MM-DD` text are parsed.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Borrowed text of the cell, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Parses the timestamp formats the profiler emits and commonly sees.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Decodes every row of an Arrow column into cell values.
pub fn column_values(array: &ArrayRef) -> Result<Vec<CellValue>> {
    match array.data_type() {
        DataType::Null => Ok(vec![CellValue::Null; array.len()]),
        DataType::Boolean => {
            let arr = array.as_boolean();
            Ok((0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Boolean(arr.value(i))
                    }
                })
                .collect())
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let casted = cast(array, &DataType::Int64)?;
            let arr = casted.as_primitive::<Int64Type>();
            Ok((0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Integer(arr.value(i))
                    }
                })
                .collect())
        }
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => {
            let casted = cast(array, &DataType::Float64)?;
            let arr = casted.as_primitive::<Float64Type>();
            Ok((0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Float(arr.value(i))
                    }
                })
                .collect())
        }
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            let casted = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, None))?;
            let arr = casted.as_primitive::<TimestampMicrosecondType>();
            Ok((0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        return CellValue::Null;
                    }
                    DateTime::<Utc>::from_timestamp_micros(arr.value(i))
                        .map(CellValue::Timestamp)
                        .unwrap_or(CellValue::Null)
                })
                .collect())
        }
        _ => {
            let casted = cast(array, &DataType::Utf8)?;
            let arr = casted.as_string::<i32>();
            Ok((0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Text(arr.value(i).to_string())
                    }
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BooleanArray, Float32Array, Int32Array, StringArray, StringViewArray};
    use std::sync::Arc;

    #[test]
    fn test_decode_integers_with_nulls() {
        let array: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None, Some(3)]));
        let values = column_values(&array).unwrap();
        assert_eq!(
            values,
            vec![CellValue::Integer(1), CellValue::Null, CellValue::Integer(3)]
        );
    }

    #[test]
    fn test_decode_floats_and_strings() {
        let floats: ArrayRef = Arc::new(Float32Array::from(vec![1.5f32]));
        assert_eq!(column_values(&floats).unwrap(), vec![CellValue::Float(1.5)]);

        let strings: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), None]));
        assert_eq!(
            column_values(&strings).unwrap(),
            vec![CellValue::Text("a".to_string()), CellValue::Null]
        );

        let views: ArrayRef = Arc::new(StringViewArray::from(vec!["view"]));
        assert_eq!(
            column_values(&views).unwrap(),
            vec![CellValue::Text("view".to_string())]
        );
    }

    #[test]
    fn test_decode_booleans() {
        let array: ArrayRef = Arc::new(BooleanArray::from(vec![true, false]));
        assert_eq!(
            column_values(&array).unwrap(),
            vec![CellValue::Boolean(true), CellValue::Boolean(false)]
        );
    }

    #[test]
    fn test_cell_views() {
        assert_eq!(CellValue::Text(" 42 ".into()).as_f64(), Some(42.0));
        assert_eq!(CellValue::Float(2.9).as_i64(), Some(2));
        assert_eq!(CellValue::Null.as_f64(), None);
        let ts = CellValue::Text("2024-03-01".into()).as_timestamp().unwrap();
        assert_eq!(ts.format("%Y-%m-%d").to_string(), "2024-03-01");
    }
}
