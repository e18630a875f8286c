use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

const DATETIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ZONED_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Type of a [`super::Column`].
///
/// Mirrors the nullable types the configuration may request for a column. Every type can hold [`Value::Null`].
///
/// # Examples
///
/// ```
/// use perflog_post::frame::DType;
///
/// assert_eq!("float64".parse::<DType>(), Ok(DType::Float));
/// assert_eq!(DType::Int.to_string(), "int");
/// assert!("complex".parse::<DType>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    /// Free-form text.
    Str,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Timestamp without timezone, timezone-aware inputs are converted to UTC.
    DateTime,
}

impl DType {
    /// Whether arithmetic can be applied to values of this type.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Narrowest type able to hold values of both `self` and `other` without a fallible conversion.
    #[must_use]
    pub fn unify(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            _ => Self::Str,
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::DateTime => "datetime",
        };
        write!(f, "{name}")
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "str" | "string" | "object" => Ok(Self::Str),
            "int" | "int64" | "Int64" | "integer" => Ok(Self::Int),
            "float" | "float64" | "double" => Ok(Self::Float),
            "datetime" | "datetime64" | "datetime64[ns]" => Ok(Self::DateTime),
            other => Err(other.to_string()),
        }
    }
}

/// A single cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// Text.
    Str(String),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Timestamp.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Whether this cell is missing.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Type of this cell, `None` for nulls.
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Self::Null => None,
            Self::Str(_) => Some(DType::Str),
            Self::Int(_) => Some(DType::Int),
            Self::Float(_) => Some(DType::Float),
            Self::DateTime(_) => Some(DType::DateTime),
        }
    }

    /// Numeric view of this cell.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Text of a raw perflog field, empty fields are null.
    #[must_use]
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Self::Null
        } else {
            Self::Str(field.to_string())
        }
    }

    /// Scalar view of a decoded JSON value. Containers are kept as their JSON text.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Str(b.to_string()),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::Str(n.to_string())),
            serde_json::Value::String(s) => Self::Str(s.clone()),
            other => Self::Str(other.to_string()),
        }
    }

    /// Converts this cell to `dtype`, as done when applying user-specified column types.
    ///
    /// Empty strings become nulls for every non-text type. `column` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] if the value cannot be represented in `dtype`.
    ///
    /// # Examples
    ///
    /// ```
    /// use perflog_post::frame::{DType, Value};
    ///
    /// let v = Value::Str("4".to_string()).cast(DType::Int, "tasks").unwrap();
    /// assert_eq!(v, Value::Int(4));
    ///
    /// assert!(Value::Str("four".to_string()).cast(DType::Int, "tasks").is_err());
    /// ```
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn cast(self, dtype: DType, column: &str) -> Result<Self> {
        let fail = |value: &Self| Error::Conversion {
            column: column.to_string(),
            value: value.to_string(),
            dtype: dtype.to_string(),
        };

        let converted = match (self, dtype) {
            (Self::Null, _) => Self::Null,
            (Self::Str(s), DType::Str) => Self::Str(s),
            (other, DType::Str) => Self::Str(other.to_string()),
            (Self::Str(s), _) if s.trim().is_empty() => Self::Null,

            (Self::Int(i), DType::Int) => Self::Int(i),
            (Self::Str(s), DType::Int) => {
                let trimmed = s.trim();
                match trimmed.parse::<i64>() {
                    Ok(i) => Self::Int(i),
                    Err(_) => match trimmed.parse::<f64>() {
                        Ok(f) if f.is_finite() && f.fract() == 0.0 => Self::Int(f as i64),
                        _ => return Err(fail(&Self::Str(s))),
                    },
                }
            }
            (Self::Float(f), DType::Int) if f.is_nan() => Self::Null,
            (Self::Float(f), DType::Int) if f.is_finite() && f.fract() == 0.0 => {
                Self::Int(f as i64)
            }

            (Self::Float(f), DType::Float) => Self::Float(f),
            (Self::Int(i), DType::Float) => Self::Float(i as f64),
            (Self::Str(s), DType::Float) => match s.trim().parse::<f64>() {
                Ok(f) => Self::Float(f),
                Err(_) => return Err(fail(&Self::Str(s))),
            },

            (Self::DateTime(d), DType::DateTime) => Self::DateTime(d),
            (Self::Str(s), DType::DateTime) => match parse_datetime(s.trim()) {
                Some(d) => Self::DateTime(d),
                None => return Err(fail(&Self::Str(s))),
            },

            (other, _) => return Err(fail(&other)),
        };
        Ok(converted)
    }

    /// Interprets a configuration scalar as a value of the column's type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] if `text` is not a valid `dtype` value.
    pub fn coerce(text: &str, dtype: DType, column: &str) -> Result<Self> {
        Self::Str(text.to_string()).cast(dtype, column)
    }

    /// Infallible conversion to a type produced by [`DType::unify`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn widen(self, dtype: DType) -> Self {
        match (self, dtype) {
            (Self::Null, _) => Self::Null,
            (Self::Int(i), DType::Float) => Self::Float(i as f64),
            (v @ Self::Str(_), DType::Str) => v,
            (v, DType::Str) => Self::Str(v.to_string()),
            (v, _) => v,
        }
    }

    /// Compares two cells of compatible types, `None` when either is null or the types cannot be ordered.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    /// Total order used for sorting: typed comparison where possible, nulls last.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self
                .compare(other)
                .unwrap_or_else(|| self.to_string().cmp(&other.to_string())),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::DateTime(d) => write!(f, "{}", d.format(DATETIME_DISPLAY_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) if x.is_nan() => serializer.serialize_none(),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::DateTime(_) => serializer.collect_str(self),
        }
    }
}

/// Parses the timestamp formats found in perflogs and configuration files.
///
/// Zoned timestamps are converted to UTC.
#[must_use]
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.naive_utc());
    }
    for format in ZONED_DATETIME_FORMATS {
        if let Ok(d) = DateTime::parse_from_str(s, format) {
            return Some(d.naive_utc());
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, format) {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
